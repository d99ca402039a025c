//! Error types.

// All lovingly made without thiserror!

/// Errors from parsing an IRC message.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The line was empty after stripping whitespace.
    Empty,
    /// The line has a prefix but nothing after it.
    MissingCommand,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty line"),
            ParseError::MissingCommand => write!(f, "missing command"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for std::io::Error {
    fn from(value: ParseError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, value)
    }
}

/// Errors from reading or writing a [`Config`][crate::config::Config].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConfigError {
    /// The config is locked because the client is connected.
    Locked,
    /// These required keys have no value.
    Missing(Vec<String>),
    /// The key has never been defined.
    Unknown(String),
    /// The key holds a value of a different type than was asked for.
    WrongType(String, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Locked => write!(f, "config is locked while connected"),
            ConfigError::Missing(keys) => write!(f, "missing required keys: {}", keys.join(", ")),
            ConfigError::Unknown(key) => write!(f, "unknown config key {key}"),
            ConfigError::WrongType(key, ty) => write!(f, "config key {key} is not {ty}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced to code driving a [`Client`][crate::client::Client].
///
/// Network and protocol failures during steady-state operation are never returned here;
/// they arrive as events instead.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The configuration is invalid.
    Config(ConfigError),
    /// `start` was called on a client that is already running.
    AlreadyRunning,
    /// `quit` was called on a client that is not running.
    NotRunning,
    /// Registration could not complete; contains the last nick attempted.
    RegistrationFailed(String),
    /// The client stopped because it could not connect and may not retry.
    Connection(std::sync::Arc<std::io::Error>),
    /// A local I/O failure, such as failing to build a runtime.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::AlreadyRunning => write!(f, "client is already running"),
            Error::NotRunning => write!(f, "client is not running"),
            Error::RegistrationFailed(nick) => write!(f, "registration failed with nick {nick}"),
            Error::Connection(e) => write!(f, "connection failed: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Connection(e) => Some(e.as_ref()),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        Error::Config(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}
