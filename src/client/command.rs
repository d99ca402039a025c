use crate::ircmsg::format_line;
use crate::names::cmd;

/// Outbound actions queued for a client's command loop.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum Command {
    /// Sends a line verbatim.
    Raw(String),
    /// Attempts to change nick.
    Nick(String),
    /// Joins a channel.
    Join(String),
    /// Leaves a channel.
    Part {
        /// The channel to leave.
        channel: String,
        /// An optional parting message.
        reason: Option<String>,
    },
    /// Sends a message.
    Privmsg {
        /// A channel or nick.
        target: String,
        /// The message text.
        text: String,
    },
    /// Sends a notice.
    Notice {
        /// A channel or nick.
        target: String,
        /// The notice text.
        text: String,
    },
    /// Replies to a server ping.
    Pong(String),
    /// Quits, with an optional reason.
    Quit(Option<String>),
    /// Aborts the session because registration cannot complete with this nick.
    Fail(String),
    /// Stops the command loop.
    Halt,
}

impl Command {
    /// Returns the line this command sends, if it sends exactly one.
    ///
    /// [`Command::Nick`], [`Command::Quit`], [`Command::Fail`] and [`Command::Halt`]
    /// have side effects beyond one line and return `None`.
    pub fn line(&self) -> Option<String> {
        let line = match self {
            Command::Raw(line) => line.clone(),
            Command::Join(chan) => format_line(cmd::JOIN, [chan.as_str()], None),
            Command::Part { channel, reason } => {
                format_line(cmd::PART, [channel.as_str()], reason.as_deref())
            }
            Command::Privmsg { target, text } => {
                format_line(cmd::PRIVMSG, [target.as_str()], Some(text))
            }
            Command::Notice { target, text } => {
                format_line(cmd::NOTICE, [target.as_str()], Some(text))
            }
            Command::Pong(param) => format_line(cmd::PONG, [], Some(param)),
            Command::Nick(_) | Command::Quit(_) | Command::Fail(_) | Command::Halt => return None,
        };
        Some(line)
    }
}
