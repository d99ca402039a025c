//! Observer registries with synchronous and supervised asynchronous delivery.
//!
//! A [`Dispatcher`] is owned by whatever produces events
//! (a [`Connection`][crate::client::conn::Connection], a [`Client`][crate::client::Client])
//! and delivers each published event to every [`Observer`] whose [`Interest`] covers it.

pub mod tasks;
#[cfg(test)]
mod tests;

use crate::util::{lock, panic_message};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;

use tasks::TaskSet;

/// Values that can be published through a [`Dispatcher`].
pub trait Event {
    /// The name observers subscribe to this event by.
    fn name(&self) -> Cow<'_, str>;
}

/// Receivers of events.
///
/// Implementations should return promptly; synchronous delivery holds up the publisher.
pub trait Observer<E>: Send + Sync {
    /// Handles one event.
    fn notify(&self, event: &E);
}

impl<E, F: Fn(&E) + Send + Sync> Observer<E> for F {
    fn notify(&self, event: &E) {
        self(event);
    }
}

/// Which events an observer wants.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Interest {
    /// Every event.
    All,
    /// Only events with these names.
    Only(BTreeSet<String>),
}

impl Interest {
    /// Creates an [`Interest::Only`] from a list of event names.
    pub fn only<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Interest::Only(names.into_iter().map(Into::into).collect())
    }
    /// Returns `true` if events named `name` are wanted.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Interest::All => true,
            Interest::Only(names) => names.contains(name),
        }
    }
}

/// Identifies a subscription for later removal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SubscriptionId(u64);

struct Subscription<E> {
    id: SubscriptionId,
    interest: Interest,
    observer: Arc<dyn Observer<E>>,
}

/// A registry of observers for events of type `E`.
pub struct Dispatcher<E> {
    subs: Mutex<Vec<Subscription<E>>>,
    next_id: AtomicU64,
    serial: Serial,
    tasks: Option<TaskSet>,
}

impl<E> std::fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &lock(&self.subs).len())
            .field("tasks", &self.tasks)
            .finish()
    }
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Dispatcher<E> {
    /// Creates a dispatcher capable only of synchronous delivery.
    pub fn new() -> Self {
        Dispatcher {
            subs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            serial: Serial::default(),
            tasks: None,
        }
    }
    /// Creates a dispatcher that spawns asynchronous deliveries into `tasks`.
    pub fn with_tasks(tasks: TaskSet) -> Self {
        Dispatcher { tasks: Some(tasks), ..Self::new() }
    }
    /// Returns the task set used for asynchronous delivery, if any.
    pub fn tasks(&self) -> Option<&TaskSet> {
        self.tasks.as_ref()
    }
    /// Adds an observer.
    ///
    /// Observers are notified in the order they subscribed.
    pub fn subscribe(&self, interest: Interest, observer: Arc<dyn Observer<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subs).push(Subscription { id, interest, observer });
        id
    }
    /// Removes an observer from every event it was subscribed to.
    ///
    /// Returns `false` if there was no such subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.subs);
        let len = subs.len();
        subs.retain(|sub| sub.id != id);
        subs.len() != len
    }
    /// Removes every observer.
    pub fn unsubscribe_all(&self) {
        lock(&self.subs).clear();
    }
    /// Returns how many observers are subscribed.
    pub fn len(&self) -> usize {
        lock(&self.subs).len()
    }
    /// Returns `true` if there are no observers.
    pub fn is_empty(&self) -> bool {
        lock(&self.subs).is_empty()
    }
    /// Aborts any asynchronous deliveries still in flight.
    pub fn cancel_pending(&self) {
        if let Some(tasks) = &self.tasks {
            tasks.cancel_all();
        }
    }
    // Snapshot so observers may (un)subscribe while being notified.
    fn interested(&self, name: &str) -> Vec<Arc<dyn Observer<E>>> {
        lock(&self.subs)
            .iter()
            .filter(|sub| sub.interest.matches(name))
            .map(|sub| sub.observer.clone())
            .collect()
    }
}

impl<E: Event> Dispatcher<E> {
    /// Delivers `event` to every interested observer before returning.
    ///
    /// Concurrent calls from different threads are serialized.
    /// A nested call from within an observer on the same thread is delivered immediately.
    /// A panicking observer is logged and does not stop delivery to the rest.
    pub fn publish(&self, event: &E) {
        let name = event.name();
        let _guard = self.serial.enter();
        for observer in self.interested(&name) {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| observer.notify(event)));
            if let Err(payload) = result {
                let msg = panic_message(payload.as_ref());
                tracing::error!(target: "ivybot", "observer of {name} panicked: {msg}");
            }
        }
    }
}

impl<E: Event + Send + Sync + 'static> Dispatcher<E> {
    /// Delivers `event` to every interested observer, each on its own task.
    ///
    /// Deliveries are started in subscription order; their completion order is unspecified.
    /// Without a task set, falls back to [`publish`][Dispatcher::publish].
    pub fn publish_async(&self, event: E) {
        let Some(tasks) = &self.tasks else {
            tracing::debug!(target: "ivybot", "no task set, delivering {} inline", event.name());
            self.publish(&event);
            return;
        };
        let name = event.name().into_owned();
        let event = Arc::new(event);
        for observer in self.interested(&name) {
            let event = event.clone();
            tasks.spawn(format!("{name} observer"), async move { observer.notify(&event) });
        }
    }
}

/// A critical section that the owning thread may re-enter.
#[derive(Default)]
struct Serial {
    owner: Mutex<(Option<ThreadId>, usize)>,
    free: Condvar,
}

struct SerialGuard<'a>(&'a Serial);

impl Serial {
    fn enter(&self) -> SerialGuard<'_> {
        let me = std::thread::current().id();
        let mut owner = lock(&self.owner);
        loop {
            match owner.0 {
                None => {
                    *owner = (Some(me), 1);
                    break;
                }
                Some(id) if id == me => {
                    owner.1 += 1;
                    break;
                }
                Some(_) => {
                    owner =
                        self.free.wait(owner).unwrap_or_else(std::sync::PoisonError::into_inner);
                }
            }
        }
        SerialGuard(self)
    }
}

impl Drop for SerialGuard<'_> {
    fn drop(&mut self) {
        let mut owner = lock(&self.0.owner);
        owner.1 -= 1;
        if owner.1 == 0 {
            owner.0 = None;
            self.0.free.notify_one();
        }
    }
}
