use std::any::Any;
use std::sync::{Mutex, MutexGuard};

#[cfg(test)]
mod tests;

/// Locks a mutex, ignoring poisoning.
///
/// Handlers run under several of these locks and are allowed to panic;
/// the data they guard stays consistent between statements.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Best-effort extraction of the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
