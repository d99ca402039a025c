//! Runtime client state shared between the connection, plugins, and host code.

#[cfg(test)]
mod tests;

use crate::util::lock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Keys for [`ClientState`].
///
/// Each key is a type, and determines the type of the value stored under it.
/// Host applications define their own keys the same way.
pub trait StateKey: Any {
    /// The type of data associated with this key.
    type Value: Any + Send + Sync + Clone;
}

macro_rules! csk {
    ($name:ident: $inner:ty = $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
        pub struct $name;

        impl StateKey for $name {
            type Value = $inner;
        }
    };
}

csk!(Nick: String = "The nick the server has confirmed the client is using.");
csk!(NewNick: VecDeque<String> = "Nicks that have been sent in NICK messages, oldest first.");
csk!(Scratch: HashMap<String, Vec<String>> = "NAMES replies being accumulated, by channel.");
csk!(RegistrationFailed: String = "The nick whose rejection made registration impossible.");

/// A thread-safe, type-keyed store of runtime state.
#[derive(Default)]
pub struct ClientState {
    values: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState").field("len", &lock(&self.values).len()).finish()
    }
}

impl ClientState {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns a copy of the value for `K`, if one is set.
    pub fn get<K: StateKey>(&self) -> Option<K::Value> {
        lock(&self.values).get(&TypeId::of::<K>()).and_then(|v| v.downcast_ref()).cloned()
    }
    /// Returns `true` if a value is set for `K`.
    pub fn contains<K: StateKey>(&self) -> bool {
        lock(&self.values).contains_key(&TypeId::of::<K>())
    }
    /// Sets the value for `K`, returning the old one.
    pub fn insert<K: StateKey>(&self, value: K::Value) -> Option<K::Value> {
        let old = lock(&self.values).insert(TypeId::of::<K>(), Box::new(value));
        old.and_then(|v| v.downcast().ok()).map(|v| *v)
    }
    /// Removes and returns the value for `K`.
    pub fn remove<K: StateKey>(&self) -> Option<K::Value> {
        let old = lock(&self.values).remove(&TypeId::of::<K>());
        old.and_then(|v| v.downcast().ok()).map(|v| *v)
    }
    /// Runs `f` on the value for `K` under the state's lock,
    /// inserting a default value first if none is set.
    ///
    /// `f` must not access `self`.
    pub fn with<K, R>(&self, f: impl FnOnce(&mut K::Value) -> R) -> R
    where
        K: StateKey,
        K::Value: Default,
    {
        let mut values = lock(&self.values);
        let entry = values
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(<K::Value as Default>::default()));
        match entry.downcast_mut::<K::Value>() {
            Some(value) => f(value),
            None => {
                // Values are always stored under their own key's TypeId.
                let mut value = <K::Value as Default>::default();
                let retval = f(&mut value);
                *entry = Box::new(value);
                retval
            }
        }
    }
    /// Removes every value.
    pub fn clear(&self) {
        lock(&self.values).clear();
    }

    // Conveniences for the built-in keys.

    /// Returns the nick the client is using, if registered.
    pub fn nick(&self) -> Option<String> {
        self.get::<Nick>()
    }
    /// Adds a nick onto the end of the pending-nick queue.
    pub fn push_new_nick(&self, nick: impl Into<String>) {
        self.with::<NewNick, _>(|q| q.push_back(nick.into()));
    }
    /// Removes and returns the oldest pending nick.
    pub fn pop_new_nick(&self) -> Option<String> {
        self.with::<NewNick, _>(VecDeque::pop_front)
    }
    /// Returns the oldest pending nick without removing it.
    pub fn peek_new_nick(&self) -> Option<String> {
        self.with::<NewNick, _>(|q| q.front().cloned())
    }
    /// Returns a copy of every pending nick, oldest first.
    pub fn new_nicks(&self) -> Vec<String> {
        self.with::<NewNick, _>(|q| q.iter().cloned().collect())
    }
}
