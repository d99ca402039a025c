use crate::ircmsg::User;
use crate::notify::Event;
use std::borrow::Cow;
use std::sync::Arc;

/// High-level events a client publishes to its observers and plugins.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ClientEvent {
    /// The connection to the server is open. Registration has been sent.
    Connected,
    /// The connection to the server was lost or closed.
    Disconnected,
    /// Connecting or sending failed.
    ConnectionError(Arc<std::io::Error>),
    /// The server accepted registration.
    RegisteredWithServer {
        /// The nick the server addressed the welcome to.
        nick: String,
    },
    /// The server sent a PING.
    ServerPing {
        /// The value to echo back.
        param: String,
    },
    /// Someone, possibly this client, changed nick.
    NickChanged {
        /// Who changed nick, under their old nick.
        who: User,
        /// The new nick.
        to: String,
    },
    /// A requested nick is taken.
    NickInUse {
        /// The nick that was rejected.
        nick: String,
    },
    /// A requested nick is missing or invalid.
    NickInvalid {
        /// The nick that was rejected.
        nick: String,
    },
    /// Someone joined a channel.
    Join {
        /// Who joined.
        who: User,
        /// The channel they joined.
        channel: String,
    },
    /// Someone left a channel.
    Part {
        /// Who left.
        who: User,
        /// The channel they left.
        channel: String,
        /// Their parting message.
        reason: Option<String>,
    },
    /// Someone disconnected from the network.
    Quit {
        /// Who quit.
        who: User,
        /// Their quit message.
        reason: Option<String>,
    },
    /// A channel's topic was changed or reported.
    Topic {
        /// Who changed it, or `None` if the server is reporting the current topic.
        who: Option<User>,
        /// The channel.
        channel: String,
        /// The topic.
        topic: String,
    },
    /// A PRIVMSG to a channel.
    ChannelMessage {
        /// The sender.
        who: User,
        /// The channel.
        target: String,
        /// The message text.
        text: String,
    },
    /// A PRIVMSG to this client.
    PrivateMessage {
        /// The sender.
        who: User,
        /// This client's nick.
        target: String,
        /// The message text.
        text: String,
    },
    /// A NOTICE to a channel.
    ChannelNotice {
        /// The sender.
        who: User,
        /// The channel.
        target: String,
        /// The notice text.
        text: String,
    },
    /// A NOTICE to this client.
    PrivateNotice {
        /// The sender.
        who: User,
        /// This client's nick.
        target: String,
        /// The notice text.
        text: String,
    },
    /// The complete list of nicks in a channel, with membership prefixes removed.
    ChannelNameList {
        /// The channel.
        channel: String,
        /// The nicks.
        names: Vec<String>,
    },
    /// The client is quitting. Plugins should release their resources.
    Teardown,
}

impl Event for ClientEvent {
    fn name(&self) -> Cow<'_, str> {
        let name = match self {
            ClientEvent::Connected => "connected",
            ClientEvent::Disconnected => "disconnected",
            ClientEvent::ConnectionError(_) => "connection_error",
            ClientEvent::RegisteredWithServer { .. } => "registered_with_server",
            ClientEvent::ServerPing { .. } => "server_ping",
            ClientEvent::NickChanged { .. } => "nick_changed",
            ClientEvent::NickInUse { .. } => "nick_in_use",
            ClientEvent::NickInvalid { .. } => "nick_invalid",
            ClientEvent::Join { .. } => "join",
            ClientEvent::Part { .. } => "part",
            ClientEvent::Quit { .. } => "quit",
            ClientEvent::Topic { .. } => "topic",
            ClientEvent::ChannelMessage { .. } => "channel_message",
            ClientEvent::PrivateMessage { .. } => "private_message",
            ClientEvent::ChannelNotice { .. } => "channel_notice",
            ClientEvent::PrivateNotice { .. } => "private_notice",
            ClientEvent::ChannelNameList { .. } => "channel_name_list",
            ClientEvent::Teardown => "teardown",
        };
        Cow::Borrowed(name)
    }
}
