//! Parsed IRC messages.

mod source;
#[cfg(test)]
mod tests;

use crate::error::ParseError;

pub use self::source::*;

/// An IRC message received from a server.
///
/// Messages are immutable once parsed and are shared by reference
/// between every handler interested in them.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Message {
    /// Where this message originated.
    pub prefix: Prefix,
    /// The command token, either textual (`PRIVMSG`) or a three-digit numeric (`001`).
    pub command: String,
    /// This message's parameters, including the trailing one.
    pub params: Vec<String>,
    /// The line this message was parsed from, for diagnostics.
    pub raw: String,
}

impl Message {
    /// Creates a new `Message` with no prefix or parameters.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Message { prefix: Prefix::None, raw: command.clone(), command, params: Vec::new() }
    }
    /// Parses one line.
    ///
    /// Trailing whitespace (including CRLF) is ignored.
    pub fn parse(line: &str) -> Result<Message, ParseError> {
        let raw = line.trim_end();
        let mut rest = raw.trim_start();
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut prefix = Prefix::None;
        if let Some(src) = rest.strip_prefix(':') {
            let (word, remainder) = split_word(src);
            if word.is_empty() {
                return Err(ParseError::MissingCommand);
            }
            prefix = Prefix::parse(word);
            rest = remainder.trim_start_matches(' ');
        }
        let (command, mut rest) = split_word(rest);
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (word, remainder) = split_word(rest);
            params.push(word.to_owned());
            rest = remainder;
        }
        Ok(Message { prefix, command: command.to_owned(), params, raw: raw.to_owned() })
    }
    /// Returns the name of whoever sent this message.
    ///
    /// This is the server name or the user's nick, falling back to the first parameter
    /// for messages without a usable prefix (e.g. `PING :server`).
    pub fn sender(&self) -> Option<&str> {
        self.prefix.name().or_else(|| self.param(0))
    }
    /// Returns the sending user, if the prefix was a full `nick!user@host`.
    pub fn user(&self) -> Option<&User> {
        match &self.prefix {
            Prefix::User(user) => Some(user),
            _ => None,
        }
    }
    /// Returns the parameter at the provided index.
    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }
    /// Returns the last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
    /// Returns `true` if the command is a numeric reply.
    pub fn is_numeric(&self) -> bool {
        parse_numeric(&self.command).is_some()
    }
    /// Returns the name of the plugin handler for this message.
    ///
    /// See [`handler_name`].
    pub fn handler_name(&self) -> String {
        handler_name(&self.command)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.prefix.is_none() {
            write!(f, ":{} ", self.prefix)?;
        }
        let (trailing, args) = match self.params.split_last() {
            Some((last, args)) => (Some(last.as_str()), args),
            None => (None, &[][..]),
        };
        write_line(f, &self.command, args.iter().map(String::as_str), trailing, false)
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

fn parse_numeric(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Maps a command token to the name of the handler that processes it.
///
/// Numeric replies map to `m` followed by the code zero-padded to three digits
/// (`001` becomes `m001`). Every other command maps to its lowercase form.
pub fn handler_name(token: &str) -> String {
    if let Some(num) = parse_numeric(token) {
        format!("m{num:03}")
    } else {
        token.to_ascii_lowercase()
    }
}

/// Builds one outgoing line of the form `COMMAND arg1 arg2 :trailing`, without CRLF.
///
/// The trailing parameter is always colon-prefixed when present.
pub fn format_line<'a>(
    command: &str,
    args: impl IntoIterator<Item = &'a str>,
    trailing: Option<&str>,
) -> String {
    let mut line = String::with_capacity(64);
    let _ = write_line(&mut line, command, args, trailing, true);
    line
}

fn write_line<'a>(
    w: &mut impl std::fmt::Write,
    command: &str,
    args: impl IntoIterator<Item = &'a str>,
    trailing: Option<&str>,
    always_colon: bool,
) -> std::fmt::Result {
    w.write_str(command)?;
    for arg in args {
        write!(w, " {arg}")?;
    }
    if let Some(trailing) = trailing {
        let needs_colon =
            trailing.is_empty() || trailing.starts_with(':') || trailing.contains(' ');
        if always_colon || needs_colon {
            write!(w, " :{trailing}")?;
        } else {
            write!(w, " {trailing}")?;
        }
    }
    Ok(())
}

impl crate::notify::Event for Message {
    fn name(&self) -> std::borrow::Cow<'_, str> {
        self.handler_name().into()
    }
}
