//! The built-in plugin that completes registration and answers pings.

use super::{Plugin, Session};
use crate::{
    client::{ClientEvent, Command},
    state::{Nick, RegistrationFailed},
};

/// Keeps the live nick in step with the server and replies to PINGs.
///
/// Relies on the server answering NICK messages in the order they were sent:
/// each answer settles the oldest entry of the pending-nick queue.
#[derive(Debug)]
pub struct CorePlugin {
    session: Session,
}

impl CorePlugin {
    fn commit(&self, nick: String) {
        tracing::info!(target: "ivybot", "nick is now {nick}");
        self.session.state.insert::<Nick>(nick);
    }
}

impl Plugin for CorePlugin {
    fn new(session: Session) -> Self {
        CorePlugin { session }
    }

    fn event(&mut self, event: &ClientEvent) {
        let state = &self.session.state;
        match event {
            ClientEvent::RegisteredWithServer { nick } => {
                let nick = state.pop_new_nick().unwrap_or_else(|| nick.clone());
                self.commit(nick);
            }
            ClientEvent::NickChanged { who, to } => {
                let ours = state.nick().is_some_and(|nick| nick == who.nick);
                if ours && state.peek_new_nick().as_ref() == Some(to) {
                    state.pop_new_nick();
                    self.commit(to.clone());
                }
            }
            ClientEvent::NickInUse { nick } => {
                let Some(tried) = state.pop_new_nick() else {
                    tracing::debug!(target: "ivybot", "{nick} is in use, but no nick was pending");
                    return;
                };
                if state.nick().is_none() {
                    let next = format!("{tried}_");
                    tracing::info!(target: "ivybot", "{tried} is in use, trying {next}");
                    self.session.send(Command::Nick(next));
                }
            }
            ClientEvent::NickInvalid { nick } => {
                let tried = state.pop_new_nick().unwrap_or_else(|| nick.clone());
                if state.nick().is_none() {
                    state.insert::<RegistrationFailed>(tried.clone());
                    self.session.send(Command::Fail(tried));
                }
            }
            ClientEvent::ServerPing { param } => {
                self.session.send(Command::Pong(param.clone()));
            }
            _ => (),
        }
    }

    fn name() -> &'static str {
        "core"
    }
}
