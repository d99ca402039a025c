//! Client configuration.

#[cfg(test)]
mod tests;

use crate::error::ConfigError;
use crate::util::lock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// The server hostname. Required.
pub const HOST: &str = "host";
/// The server port. Defaults to 6667.
pub const PORT: &str = "port";
/// The nick to register with. Defaults to `rbot`.
pub const NICK: &str = "nick";
/// The username sent in USER. Defaults to `rbot`.
pub const USER: &str = "user";
/// The realname sent in USER. Defaults to `ruby irc bot`.
pub const REALNAME: &str = "realname";
/// Seconds to wait between reconnection attempts. Defaults to 10.
pub const RETRY_WAIT: &str = "retry_wait";
/// Whether to reconnect after losing the connection. Defaults to `false`.
pub const AUTO_RECONNECT: &str = "auto_reconnect";

/// A configuration value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Str(String),
}

impl Value {
    /// Returns the string value, if `self` is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    /// Returns the integer value, if `self` is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
    /// Returns the boolean value, if `self` is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => b.fmt(f),
            Value::Int(i) => i.fmt(f),
            Value::Str(s) => s.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[derive(Clone, Debug)]
enum Slot {
    Required,
    Default(Value),
    Set(Value),
}

impl Slot {
    fn value(&self) -> Option<&Value> {
        match self {
            Slot::Required => None,
            Slot::Default(v) | Slot::Set(v) => Some(v),
        }
    }
}

/// A thread-safe key/value configuration store.
///
/// Keys either hold a default, hold a set value, or are required and unset.
/// While the client is connected the config is locked and every mutator fails.
#[derive(Debug)]
pub struct Config {
    slots: Mutex<BTreeMap<String, Slot>>,
    locked: AtomicBool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Config {
    /// Clones the values of `self`. The clone is always unlocked.
    fn clone(&self) -> Self {
        Config { slots: Mutex::new(lock(&self.slots).clone()), locked: AtomicBool::new(false) }
    }
}

impl Config {
    /// Creates a config with the standard options and their defaults.
    ///
    /// [`HOST`] is required and unset.
    pub fn new() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(HOST.to_owned(), Slot::Required);
        slots.insert(PORT.to_owned(), Slot::Default(Value::Int(6667)));
        slots.insert(NICK.to_owned(), Slot::Default("rbot".into()));
        slots.insert(USER.to_owned(), Slot::Default("rbot".into()));
        slots.insert(REALNAME.to_owned(), Slot::Default("ruby irc bot".into()));
        slots.insert(RETRY_WAIT.to_owned(), Slot::Default(Value::Int(10)));
        slots.insert(AUTO_RECONNECT.to_owned(), Slot::Default(Value::Bool(false)));
        Config { slots: Mutex::new(slots), locked: AtomicBool::new(false) }
    }
    /// Creates a standard config and merges `pairs` into it.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let config = Config::new();
        config.merge(pairs)?;
        Ok(config)
    }
    /// Returns the value of `key`.
    ///
    /// # Errors
    /// Errors if `key` is required and unset, or was never defined.
    pub fn get(&self, key: &str) -> Result<Value, ConfigError> {
        match lock(&self.slots).get(key) {
            Some(slot) => {
                slot.value().cloned().ok_or_else(|| ConfigError::Missing(vec![key.to_owned()]))
            }
            None => Err(ConfigError::Unknown(key.to_owned())),
        }
    }
    /// Returns `true` if `key` currently has a value.
    pub fn has(&self, key: &str) -> bool {
        lock(&self.slots).get(key).is_some_and(|slot| slot.value().is_some())
    }
    /// Sets the value of `key`, defining it if needed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.check_unlocked()?;
        lock(&self.slots).insert(key.into(), Slot::Set(value.into()));
        Ok(())
    }
    /// Sets every key/value pair in `pairs`.
    ///
    /// Either all pairs are applied or, if the config is locked, none are.
    pub fn merge<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<(), ConfigError>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.check_unlocked()?;
        let mut slots = lock(&self.slots);
        for (key, value) in pairs {
            slots.insert(key.into(), Slot::Set(value.into()));
        }
        Ok(())
    }
    /// Marks `key` as required, discarding any default it had.
    ///
    /// A value that was explicitly set is kept.
    pub fn require(&self, key: impl Into<String>) -> Result<(), ConfigError> {
        self.check_unlocked()?;
        let mut slots = lock(&self.slots);
        let slot = slots.entry(key.into()).or_insert(Slot::Required);
        if let Slot::Default(_) = slot {
            *slot = Slot::Required;
        }
        Ok(())
    }
    /// Checks that every required key has a value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = lock(&self.slots)
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Required))
            .map(|(key, _)| key.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }
    /// Makes the config read-only.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }
    /// Makes the config writable again.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
    /// Returns `true` if the config is read-only.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
    fn check_unlocked(&self) -> Result<(), ConfigError> {
        if self.is_locked() {
            Err(ConfigError::Locked)
        } else {
            Ok(())
        }
    }
    fn get_str(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = self.get(key)?;
        match value {
            Value::Str(s) => Ok(s),
            _ => Err(ConfigError::WrongType(key.to_owned(), "a string")),
        }
    }
    fn get_int(&self, key: &'static str) -> Result<i64, ConfigError> {
        // Numbers from text formats may arrive as strings.
        match self.get(key)? {
            Value::Int(i) => Ok(i),
            Value::Str(s) => {
                s.trim().parse().map_err(|_| ConfigError::WrongType(key.to_owned(), "an integer"))
            }
            Value::Bool(_) => Err(ConfigError::WrongType(key.to_owned(), "an integer")),
        }
    }
    /// The server hostname.
    pub fn host(&self) -> Result<String, ConfigError> {
        self.get_str(HOST)
    }
    /// The server port.
    pub fn port(&self) -> Result<u16, ConfigError> {
        let port = self.get_int(PORT)?;
        port.try_into().map_err(|_| ConfigError::WrongType(PORT.to_owned(), "a port number"))
    }
    /// The nick to register with.
    pub fn nick(&self) -> Result<String, ConfigError> {
        self.get_str(NICK)
    }
    /// The username.
    pub fn user(&self) -> Result<String, ConfigError> {
        self.get_str(USER)
    }
    /// The realname.
    pub fn realname(&self) -> Result<String, ConfigError> {
        self.get_str(REALNAME)
    }
    /// How long to wait between reconnection attempts.
    pub fn retry_wait(&self) -> Result<Duration, ConfigError> {
        let secs = self.get_int(RETRY_WAIT)?;
        let secs = u64::try_from(secs)
            .map_err(|_| ConfigError::WrongType(RETRY_WAIT.to_owned(), "a duration"))?;
        Ok(Duration::from_secs(secs))
    }
    /// Whether to reconnect automatically.
    pub fn auto_reconnect(&self) -> Result<bool, ConfigError> {
        match self.get(AUTO_RECONNECT)? {
            Value::Bool(b) => Ok(b),
            Value::Str(s) if s == "true" => Ok(true),
            Value::Str(s) if s == "false" => Ok(false),
            _ => Err(ConfigError::WrongType(AUTO_RECONNECT.to_owned(), "a boolean")),
        }
    }
}
