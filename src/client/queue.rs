#[cfg(test)]
mod tests;

use crate::util::lock;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A thread-safe blocking FIFO of outbound commands.
///
/// Any number of threads may [`add`][CommandQueue::add] to the queue.
/// It is intended to be drained by one consumer, usually a client's command loop,
/// though concurrent consumers are safe.
pub struct CommandQueue<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
}

impl<T> std::fmt::Debug for CommandQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue").field("len", &self.len()).finish()
    }
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for CommandQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        CommandQueue { queue: Mutex::new(iter.into_iter().collect()), ready: Condvar::new() }
    }
}

impl<T> CommandQueue<T> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        CommandQueue { queue: Mutex::new(VecDeque::with_capacity(4)), ready: Condvar::new() }
    }
    /// Adds one or more items onto the end of the queue.
    ///
    /// Never blocks beyond briefly contending for the lock.
    pub fn add(&self, items: impl IntoIterator<Item = T>) {
        let mut queue = lock(&self.queue);
        let was_empty = queue.is_empty();
        queue.extend(items);
        let added = !queue.is_empty();
        std::mem::drop(queue);
        if was_empty && added {
            self.ready.notify_one();
        }
    }
    /// Adds one item onto the end of the queue.
    pub fn push(&self, item: T) {
        self.add(std::iter::once(item));
    }
    /// Removes and returns the oldest item, blocking until one is available.
    pub fn dequeue(&self) -> T {
        let mut queue = lock(&self.queue);
        loop {
            if let Some(item) = queue.pop_front() {
                self.pass_baton(&queue);
                return item;
            }
            queue = self.ready.wait(queue).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
    /// As [`dequeue`][CommandQueue::dequeue], but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = lock(&self.queue);
        loop {
            if let Some(item) = queue.pop_front() {
                self.pass_baton(&queue);
                return Some(item);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return None;
            }
            queue = self
                .ready
                .wait_timeout(queue, left)
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .0;
        }
    }
    /// Removes and returns the oldest item if there is one, without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut queue = lock(&self.queue);
        let item = queue.pop_front();
        self.pass_baton(&queue);
        item
    }
    /// Removes every item currently in the queue.
    pub fn drain(&self) -> Vec<T> {
        lock(&self.queue).drain(..).collect()
    }
    /// Returns `true` if no items are in the queue.
    ///
    /// The answer may be stale as soon as it is returned if other threads are adding items.
    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }
    /// Returns how many items are in the queue.
    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }
    // Only the first add to an empty queue notifies,
    // so a consumer leaving items behind wakes the next waiting consumer.
    fn pass_baton(&self, queue: &VecDeque<T>) {
        if !queue.is_empty() {
            self.ready.notify_one();
        }
    }
}
