//! Supervision of fire-and-forget tasks.

use crate::util::{lock, panic_message};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// How often the reaper checks for finished tasks by default.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(100);

/// A set of spawned tasks watched over by a background reaper.
///
/// The reaper periodically collects finished tasks and logs any that panicked.
/// It exits on its own once the set is empty, and is restarted by the next
/// [`spawn`][TaskSet::spawn].
/// Cloning a `TaskSet` yields another handle to the same set.
#[derive(Clone)]
pub struct TaskSet {
    handle: Handle,
    interval: Duration,
    tracked: Arc<Mutex<Tracked>>,
}

#[derive(Default)]
struct Tracked {
    tasks: Vec<(String, JoinHandle<()>)>,
    reaper: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracked = lock(&self.tracked);
        f.debug_struct("TaskSet")
            .field("tasks", &tracked.tasks.len())
            .field("reaper", &tracked.reaper.is_some())
            .field("interval", &self.interval)
            .finish()
    }
}

impl TaskSet {
    /// Creates a new empty set whose tasks run on the provided runtime.
    pub fn new(handle: Handle) -> Self {
        Self::with_interval(handle, DEFAULT_REAP_INTERVAL)
    }
    /// As [`TaskSet::new`] with a custom reaping interval.
    pub fn with_interval(handle: Handle, interval: Duration) -> Self {
        TaskSet { handle, interval, tracked: Arc::default() }
    }
    /// Returns the runtime this set spawns onto.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
    /// Spawns a task and tracks it.
    ///
    /// `label` identifies the task in logs if it panics.
    pub fn spawn(&self, label: impl Into<String>, fut: impl Future<Output = ()> + Send + 'static) {
        let mut tracked = lock(&self.tracked);
        let task = self.handle.spawn(fut);
        tracked.tasks.push((label.into(), task));
        if tracked.reaper.as_ref().map_or(true, JoinHandle::is_finished) {
            let weak = Arc::downgrade(&self.tracked);
            tracked.reaper = Some(self.handle.spawn(reap(weak, self.interval)));
        }
    }
    /// Returns how many tasks have not yet been reaped.
    pub fn len(&self) -> usize {
        lock(&self.tracked).tasks.len()
    }
    /// Returns `true` if there are no unreaped tasks.
    pub fn is_empty(&self) -> bool {
        lock(&self.tracked).tasks.is_empty()
    }
    /// Returns `true` if a reaper is currently running.
    pub fn has_reaper(&self) -> bool {
        lock(&self.tracked).reaper.as_ref().is_some_and(|r| !r.is_finished())
    }
    /// Aborts every tracked task and the reaper.
    ///
    /// Tasks are cancelled at their next suspension point; none are waited on.
    pub fn cancel_all(&self) {
        let (tasks, reaper) = {
            let mut tracked = lock(&self.tracked);
            (std::mem::take(&mut tracked.tasks), tracked.reaper.take())
        };
        if !tasks.is_empty() {
            tracing::debug!(target: "ivybot", "cancelling {} task(s)", tasks.len());
        }
        for (_, task) in tasks {
            task.abort();
        }
        if let Some(reaper) = reaper {
            reaper.abort();
        }
    }
}

async fn reap(tracked: Weak<Mutex<Tracked>>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(tracked) = tracked.upgrade() else {
            return;
        };
        let (finished, idle) = {
            let mut tracked = lock(&tracked);
            let (finished, live): (Vec<_>, Vec<_>) =
                std::mem::take(&mut tracked.tasks).into_iter().partition(|(_, t)| t.is_finished());
            tracked.tasks = live;
            let idle = tracked.tasks.is_empty();
            if idle {
                // Deciding to exit under the lock means `spawn` either sees this reaper
                // still registered or none at all.
                tracked.reaper = None;
            }
            (finished, idle)
        };
        for (label, task) in finished {
            report(&label, task.await);
        }
        if idle {
            return;
        }
    }
}

fn report(label: &str, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => (),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let msg = panic_message(payload.as_ref());
            tracing::error!(target: "ivybot", "task {label} panicked: {msg}");
        }
        Err(_) => tracing::debug!(target: "ivybot", "task {label} was cancelled"),
    }
}
