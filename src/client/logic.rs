//! Translation of protocol messages into high-level client events.

use super::{ClientEvent, Inner, Phase};
use crate::{
    ircmsg::Message,
    names::{cmd, rpl, MEMBERSHIP_PREFIXES},
    state::{Nick, Scratch},
    util::lock,
};

impl Inner {
    /// Parses one line from the server and acts on it.
    pub(super) fn handle_line(&self, line: &str) {
        let msg = match Message::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(target: "ivybot", "dropping {line:?}: {e}");
                return;
            }
        };
        self.protocol.publish(&msg);
        self.trigger_callbacks_for(&msg);
    }

    /// Publishes the client event that `msg` corresponds to, if any.
    ///
    /// Events whose observers update nick bookkeeping are published synchronously,
    /// so that they are fully handled before the next line is read.
    fn trigger_callbacks_for(&self, msg: &Message) {
        let state = &self.session.state;
        let param = |idx: usize| msg.param(idx).unwrap_or_default().to_owned();
        match msg.command.as_str() {
            rpl::RPL_WELCOME => {
                {
                    let mut phase = lock(&self.phase);
                    if *phase == Phase::Registering {
                        *phase = Phase::Registered;
                        self.phase_changed.notify_all();
                    }
                }
                tracing::info!(target: "ivybot", "registered as {}", param(0));
                self.events.publish(&ClientEvent::RegisteredWithServer { nick: param(0) });
            }
            cmd::PING => {
                let param = msg.trailing().unwrap_or_default().to_owned();
                self.events.publish(&ClientEvent::ServerPing { param });
            }
            cmd::NICK => {
                let (Some(who), Some(to)) = (msg.user(), msg.param(0)) else {
                    tracing::debug!(target: "ivybot", "malformed NICK: {}", msg.raw);
                    return;
                };
                let event = ClientEvent::NickChanged { who: who.clone(), to: to.to_owned() };
                self.events.publish(&event);
                if state.nick().is_some_and(|nick| nick == who.nick) {
                    state.insert::<Nick>(to.to_owned());
                }
            }
            rpl::ERR_NICKNAMEINUSE => {
                self.events.publish(&ClientEvent::NickInUse { nick: param(1) });
            }
            rpl::ERR_NONICKNAMEGIVEN => {
                self.events.publish(&ClientEvent::NickInvalid { nick: String::new() });
            }
            rpl::ERR_ERRONEUSNICKNAME => {
                self.events.publish(&ClientEvent::NickInvalid { nick: param(1) });
            }
            rpl::RPL_TOPIC => {
                let event = ClientEvent::Topic { who: None, channel: param(1), topic: param(2) };
                self.events.publish_async(event);
            }
            rpl::RPL_NAMREPLY => {
                // RFC 2812 has a channel-type param before the channel; RFC 1459 does not.
                let channel = if msg.params.len() >= 4 { param(2) } else { param(1) };
                let names = msg.trailing().unwrap_or_default();
                let names = names
                    .split_whitespace()
                    .map(|name| name.trim_start_matches(MEMBERSHIP_PREFIXES))
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);
                state.with::<Scratch, _>(|scratch| {
                    scratch.entry(channel).or_default().extend(names);
                });
            }
            rpl::RPL_ENDOFNAMES => {
                let channel = param(1);
                let names = state.with::<Scratch, _>(|scratch| scratch.remove(&channel));
                let names = names.unwrap_or_default();
                self.events.publish_async(ClientEvent::ChannelNameList { channel, names });
            }
            cmd::ERROR => {
                let reason = msg.trailing().unwrap_or_default();
                tracing::warn!(target: "ivybot", "server error: {reason}");
            }
            _ => self.trigger_user_callbacks_for(msg),
        }
    }

    /// Handles the commands that are always sent by a user.
    fn trigger_user_callbacks_for(&self, msg: &Message) {
        let kind = msg.command.as_str();
        if !matches!(
            kind,
            cmd::JOIN | cmd::PART | cmd::QUIT | cmd::TOPIC | cmd::PRIVMSG | cmd::NOTICE
        ) {
            tracing::trace!(target: "ivybot", "no callback for {kind}");
            return;
        }
        let Some(who) = msg.user().cloned() else {
            tracing::debug!(target: "ivybot", "{kind} without a user prefix: {}", msg.raw);
            return;
        };
        let param = |idx: usize| msg.param(idx).unwrap_or_default().to_owned();
        let event = match kind {
            cmd::JOIN => ClientEvent::Join { who, channel: param(0) },
            cmd::PART => {
                ClientEvent::Part { who, channel: param(0), reason: msg.params.get(1).cloned() }
            }
            cmd::QUIT => ClientEvent::Quit { who, reason: msg.params.first().cloned() },
            cmd::TOPIC => ClientEvent::Topic { who: Some(who), channel: param(0), topic: param(1) },
            _ => {
                let (target, text) = (param(0), param(1));
                let private = self.session.state.nick().is_some_and(|nick| nick == target);
                match (kind == cmd::PRIVMSG, private) {
                    (true, true) => ClientEvent::PrivateMessage { who, target, text },
                    (true, false) => ClientEvent::ChannelMessage { who, target, text },
                    (false, true) => ClientEvent::PrivateNotice { who, target, text },
                    (false, false) => ClientEvent::ChannelNotice { who, target, text },
                }
            }
        };
        self.events.publish_async(event);
    }
}
