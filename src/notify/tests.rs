use super::{tasks::TaskSet, Dispatcher, Event, Interest, Observer};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Ev(&'static str, u32);

impl Event for Ev {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0)
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: &Log, tag: &'static str) -> Arc<dyn Observer<Ev>> {
    let log = log.clone();
    Arc::new(move |ev: &Ev| log.lock().unwrap().push(format!("{tag}:{}:{}", ev.0, ev.1)))
}

async fn settle(cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}

#[test]
fn sync_order_and_interest() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.subscribe(Interest::only(["join"]), recorder(&log, "a"));
    dispatcher.subscribe(Interest::All, recorder(&log, "b"));
    dispatcher.subscribe(Interest::only(["part"]), recorder(&log, "c"));
    dispatcher.publish(&Ev("join", 1));
    dispatcher.publish(&Ev("part", 2));
    assert_eq!(*log.lock().unwrap(), ["a:join:1", "b:join:1", "b:part:2", "c:part:2"]);
}

#[test]
fn unsubscribe_removes_everywhere() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    let id = dispatcher.subscribe(Interest::only(["join", "part"]), recorder(&log, "a"));
    assert!(dispatcher.unsubscribe(id));
    assert!(!dispatcher.unsubscribe(id));
    dispatcher.publish(&Ev("join", 1));
    dispatcher.publish(&Ev("part", 1));
    assert!(log.lock().unwrap().is_empty());
    assert!(dispatcher.is_empty());
}

#[test]
fn panicking_observer_is_contained() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.subscribe(Interest::All, Arc::new(|_: &Ev| panic!("observer bug")));
    dispatcher.subscribe(Interest::All, recorder(&log, "after"));
    dispatcher.publish(&Ev("join", 1));
    assert_eq!(*log.lock().unwrap(), ["after:join:1"]);
}

#[test]
fn nested_publish_does_not_deadlock() {
    let log = Log::default();
    let dispatcher = Arc::new(Dispatcher::new());
    let weak = Arc::downgrade(&dispatcher);
    dispatcher.subscribe(
        Interest::only(["outer"]),
        Arc::new(move |_: &Ev| {
            if let Some(d) = weak.upgrade() {
                d.publish(&Ev("inner", 0));
            }
        }),
    );
    dispatcher.subscribe(Interest::only(["inner"]), recorder(&log, "x"));
    dispatcher.publish(&Ev("outer", 0));
    assert_eq!(*log.lock().unwrap(), ["x:inner:0"]);
}

#[test]
fn concurrent_publishers_serialize() {
    let dispatcher = Arc::new(Dispatcher::new());
    let busy = Arc::new(Mutex::new(false));
    let overlaps = Arc::new(Mutex::new(0u32));
    {
        let busy = busy.clone();
        let overlaps = overlaps.clone();
        dispatcher.subscribe(
            Interest::All,
            Arc::new(move |_: &Ev| {
                if std::mem::replace(&mut *busy.lock().unwrap(), true) {
                    *overlaps.lock().unwrap() += 1;
                }
                std::thread::sleep(Duration::from_millis(2));
                *busy.lock().unwrap() = false;
            }),
        );
    }
    let threads: Vec<_> = (0..4)
        .map(|n| {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || {
                for i in 0..10 {
                    dispatcher.publish(&Ev("tick", n * 100 + i));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(*overlaps.lock().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn async_delivery_and_idle_reaper() {
    let log = Log::default();
    let handle = tokio::runtime::Handle::current();
    let tasks = TaskSet::with_interval(handle, Duration::from_millis(10));
    let dispatcher = Dispatcher::with_tasks(tasks.clone());
    dispatcher.subscribe(Interest::All, recorder(&log, "a"));
    dispatcher.subscribe(Interest::only(["join"]), recorder(&log, "b"));
    dispatcher.publish_async(Ev("join", 1));
    assert!(tasks.has_reaper());
    settle(|| log.lock().unwrap().len() == 2).await;
    // The reaper collects both deliveries and then exits.
    settle(|| tasks.is_empty() && !tasks.has_reaper()).await;
    let mut got = log.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, ["a:join:1", "b:join:1"]);
    // And is restarted lazily.
    dispatcher.publish_async(Ev("part", 2));
    assert!(tasks.has_reaper());
    settle(|| log.lock().unwrap().len() == 3).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn async_panic_is_reaped() {
    let handle = tokio::runtime::Handle::current();
    let tasks = TaskSet::with_interval(handle, Duration::from_millis(10));
    let dispatcher = Dispatcher::with_tasks(tasks.clone());
    dispatcher.subscribe(Interest::All, Arc::new(|_: &Ev| panic!("async observer bug")));
    dispatcher.publish_async(Ev("join", 1));
    settle(|| tasks.is_empty() && !tasks.has_reaper()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_aborts_stuck_tasks() {
    let tasks = TaskSet::new(tokio::runtime::Handle::current());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let flag = Arc::new(Mutex::new(false));
    let flag2 = flag.clone();
    tasks.spawn("stuck", async move {
        let _ = rx.await;
        *flag2.lock().unwrap() = true;
    });
    assert_eq!(tasks.len(), 1);
    tasks.cancel_all();
    assert!(tasks.is_empty());
    assert!(!tasks.has_reaper());
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The receiving task is gone, so the send fails.
    assert!(tx.send(()).is_err());
    assert!(!*flag.lock().unwrap());
}
