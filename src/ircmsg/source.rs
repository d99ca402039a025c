//! Message sources, also known as a message's "prefix".

/// A `nick!user@host` identity.
///
/// Used by high-level callbacks to say who did something.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct User {
    /// The user's nickname.
    pub nick: String,
    /// The user's username, historically their local account name.
    pub user: String,
    /// The user's hostname (or vhost).
    pub host: String,
}

impl User {
    /// Creates a new `User`.
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        User { nick: nick.into(), user: user.into(), host: host.into() }
    }
    /// Parses a `nick!user@host` string.
    ///
    /// Returns `None` unless all three fields are present and non-empty.
    pub fn parse(word: &str) -> Option<Self> {
        let (nick, userhost) = word.split_once('!')?;
        let (user, host) = userhost.split_once('@')?;
        if nick.is_empty() || user.is_empty() || host.is_empty() || host.contains(['!', '@']) {
            return None;
        }
        Some(User::new(nick, user, host))
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}@{}", self.nick, self.user, self.host)
    }
}

/// The sender of a message.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Prefix {
    /// No prefix, or one that matched neither recognized shape.
    #[default]
    None,
    /// A bare server name.
    Server(String),
    /// A user's full `nick!user@host`.
    User(User),
}

impl Prefix {
    /// Classifies the provided prefix string.
    ///
    /// The provided word should NOT contain the leading ':'.
    /// A word without an `@` is taken to be a server name.
    /// A word that is neither a server name nor a full `nick!user@host`
    /// results in [`Prefix::None`]; this is not an error.
    pub fn parse(word: &str) -> Self {
        if word.is_empty() {
            Prefix::None
        } else if !word.contains('@') {
            Prefix::Server(word.to_owned())
        } else if let Some(user) = User::parse(word) {
            Prefix::User(user)
        } else {
            Prefix::None
        }
    }
    /// Returns `true` if there is no usable prefix.
    pub const fn is_none(&self) -> bool {
        matches!(self, Prefix::None)
    }
    /// Returns the server name or user nick, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Prefix::None => None,
            Prefix::Server(name) => Some(name),
            Prefix::User(user) => Some(&user.nick),
        }
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prefix::None => Ok(()),
            Prefix::Server(name) => write!(f, "{name}"),
            Prefix::User(user) => write!(f, "{user}"),
        }
    }
}
