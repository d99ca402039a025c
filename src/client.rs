//! The IRC client: connection lifecycle, registration, and event dispatch.

mod command;
pub mod conn;
mod events;
mod logic;
mod queue;

pub use {command::*, events::*, queue::*};

use crate::{
    config::{Config, Value},
    error::{ConfigError, Error},
    ircmsg::{format_line, Message},
    names::cmd,
    notify::{tasks::TaskSet, Dispatcher, Interest, Observer, SubscriptionId},
    plugin::{Plugin, PluginManager, PluginRegistry, Session},
    state::{ClientState, NewNick, Nick, Scratch},
    util::lock,
};
use conn::{Connection, ConnectionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

/// How long [`Client::quit`] waits to write QUIT before closing the socket anyway.
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Where a [`Client`] is in its lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Phase {
    /// Not running. The initial and final phase.
    #[default]
    Idle,
    /// Opening the first connection.
    Connecting,
    /// Connected and waiting for the server to accept registration.
    Registering,
    /// Registered with the server.
    Registered,
    /// Waiting to retry after losing or failing to open a connection.
    Reconnecting,
    /// Shutting down.
    Quitting,
}

/// A handle to an IRC client.
///
/// Clones refer to the same client.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<Inner>,
}

/// Whether reconnecting is currently permitted, with an interruptible wait.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn set(&self, open: bool) {
        *lock(&self.open) = open;
        self.changed.notify_all();
    }
    fn is_open(&self) -> bool {
        *lock(&self.open)
    }
    /// Waits for `dur` unless the gate closes first. Returns whether it is still open.
    fn wait(&self, dur: Duration) -> bool {
        let open = lock(&self.open);
        let (open, _) = self
            .changed
            .wait_timeout_while(open, dur, |open| *open)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *open
    }
}

struct Running {
    manager: Arc<PluginManager>,
    protocol_sub: SubscriptionId,
    event_subs: Vec<SubscriptionId>,
}

struct CommandLoop {
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

struct Inner {
    session: Session,
    connection: Arc<Connection>,
    events: Dispatcher<ClientEvent>,
    protocol: Dispatcher<Message>,
    registry: Mutex<PluginRegistry>,
    running: Mutex<Option<Running>>,
    command_loop: Mutex<Option<CommandLoop>>,
    reconnect: Arc<Gate>,
    phase: Mutex<Phase>,
    phase_changed: Condvar,
    last_error: Mutex<Option<Arc<std::io::Error>>>,
    fatal: Mutex<Option<Error>>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("phase", &*lock(&self.phase))
            .field("connection", &self.connection)
            .field("config", &self.session.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new idle client with only the core plugin registered.
    ///
    /// Background tasks run on the ambient tokio runtime if there is one.
    /// Otherwise the client builds and owns a small runtime of its own.
    pub fn new(config: Config) -> Result<Self, Error> {
        match Handle::try_current() {
            Ok(handle) => Ok(Self::build(config, handle, None)),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .thread_name("ivybot-worker")
                    .enable_time()
                    .build()?;
                let handle = runtime.handle().clone();
                Ok(Self::build(config, handle, Some(runtime)))
            }
        }
    }
    /// Creates a new idle client whose background tasks run on the provided runtime.
    pub fn with_runtime(config: Config, handle: Handle) -> Self {
        Self::build(config, handle, None)
    }
    fn build(config: Config, handle: Handle, runtime: Option<Runtime>) -> Self {
        let inner = Arc::new(Inner {
            session: Session {
                queue: Arc::default(),
                config: Arc::new(config),
                state: Arc::new(ClientState::new()),
            },
            connection: Arc::new(Connection::new()),
            events: Dispatcher::with_tasks(TaskSet::new(handle.clone())),
            protocol: Dispatcher::new(),
            registry: Mutex::new(PluginRegistry::with_core()),
            running: Mutex::new(None),
            command_loop: Mutex::new(None),
            reconnect: Arc::default(),
            phase: Mutex::new(Phase::Idle),
            phase_changed: Condvar::new(),
            last_error: Mutex::new(None),
            fatal: Mutex::new(None),
            handle,
            runtime,
        });
        let observer = ConnectionObserver(Arc::downgrade(&inner));
        inner.connection.events().subscribe(Interest::All, Arc::new(observer));
        Client { inner }
    }
    /// Returns the client's configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.inner.session.config
    }
    /// Sets configuration values.
    ///
    /// Fails while connected, when the config is locked.
    pub fn merge_config<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<(), Error>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Ok(self.inner.session.config.merge(pairs)?)
    }
    /// Returns the client's runtime state.
    pub fn state(&self) -> &Arc<ClientState> {
        &self.inner.session.state
    }
    /// Returns the queue of commands for the client to execute.
    pub fn queue(&self) -> &Arc<CommandQueue<Command>> {
        &self.inner.session.queue
    }
    /// Returns the client's current phase.
    pub fn phase(&self) -> Phase {
        *lock(&self.inner.phase)
    }
    /// Returns `true` if connected to a server.
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }
    /// Registers plugin type `P` for the provided protocol events.
    ///
    /// Takes effect the next time the client starts.
    pub fn register_plugin<P: Plugin, S: AsRef<str>>(
        &self,
        events: impl IntoIterator<Item = S>,
    ) -> &Self {
        lock(&self.inner.registry).register::<P, S>(events);
        self
    }
    /// Replaces the plugin registry used the next time the client starts.
    pub fn set_registry(&self, registry: PluginRegistry) {
        *lock(&self.inner.registry) = registry;
    }
    /// Adds an observer of high-level client events.
    pub fn subscribe(
        &self,
        interest: Interest,
        observer: Arc<dyn Observer<ClientEvent>>,
    ) -> SubscriptionId {
        self.inner.events.subscribe(interest, observer)
    }
    /// Removes an observer added with [`subscribe`][Client::subscribe].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }
    /// Adds an observer of every parsed protocol message.
    ///
    /// Messages are delivered synchronously on the reader thread in arrival order,
    /// keyed by [handler name][crate::ircmsg::handler_name].
    pub fn subscribe_protocol(
        &self,
        interest: Interest,
        observer: Arc<dyn Observer<Message>>,
    ) -> SubscriptionId {
        self.inner.protocol.subscribe(interest, observer)
    }
    /// Removes an observer added with [`subscribe_protocol`][Client::subscribe_protocol].
    pub fn unsubscribe_protocol(&self, id: SubscriptionId) -> bool {
        self.inner.protocol.unsubscribe(id)
    }
    /// Starts the client: loads plugins and connects.
    ///
    /// Connection failures are not returned. They are published as
    /// [`ClientEvent::ConnectionError`] and either retried or reported by
    /// [`wait_for_quit`][Client::wait_for_quit].
    ///
    /// # Errors
    /// Errors if the client is already running or if a required config value is unset.
    pub fn start(&self) -> Result<(), Error> {
        let inner = &self.inner;
        {
            let mut phase = lock(&inner.phase);
            if *phase != Phase::Idle {
                return Err(Error::AlreadyRunning);
            }
            inner.session.config.validate()?;
            *phase = Phase::Connecting;
            inner.phase_changed.notify_all();
        }
        *lock(&inner.fatal) = None;
        *lock(&inner.last_error) = None;
        inner.reconnect.set(true);
        let stale = inner.session.queue.drain();
        if !stale.is_empty() {
            tracing::debug!(target: "ivybot", "discarding {} stale command(s)", stale.len());
        }
        inner.load_plugins();
        if let Err(e) = inner.spawn_command_loop() {
            inner.set_phase(Phase::Quitting);
            inner.end_session();
            return Err(e.into());
        }
        if !inner.connect_once() {
            inner.after_connection_lost();
        }
        Ok(())
    }
    /// Quits with an optional reason, unloads every plugin, and disconnects.
    ///
    /// Automatic reconnection is disabled first,
    /// so a quit during a reconnect wait ends the session.
    ///
    /// # Errors
    /// Errors if the client is not running.
    pub fn quit(&self, reason: Option<&str>) -> Result<(), Error> {
        self.inner.quit(reason)
    }
    /// Blocks until the client is idle again.
    ///
    /// Returns the error that ended the session, if any.
    pub fn wait_for_quit(&self) -> Result<(), Error> {
        let mut phase = lock(&self.inner.phase);
        while *phase != Phase::Idle {
            phase = self
                .inner
                .phase_changed
                .wait(phase)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        drop(phase);
        lock(&self.inner.fatal).take().map_or(Ok(()), Err)
    }
    /// Sends one raw line.
    pub fn send_raw(&self, line: &str) -> bool {
        self.inner.connection.send(line)
    }
    /// Asks the server to change this client's nick.
    ///
    /// The nick is added to the pending-nick queue before NICK is sent,
    /// and taken off it again if NICK could not be sent.
    pub fn change_nick(&self, nick: &str) -> bool {
        self.inner.change_nick(nick)
    }
    /// Joins a channel.
    pub fn join_channel(&self, channel: &str) -> bool {
        self.send_line(&format_line(cmd::JOIN, [channel], None))
    }
    /// Leaves a channel.
    pub fn leave_channel(&self, channel: &str, reason: Option<&str>) -> bool {
        self.send_line(&format_line(cmd::PART, [channel], reason))
    }
    /// Sends a message to a channel.
    pub fn channel_message(&self, channel: &str, text: &str) -> bool {
        self.send_line(&format_line(cmd::PRIVMSG, [channel], Some(text)))
    }
    /// Sends a message to a user.
    pub fn private_message(&self, nick: &str, text: &str) -> bool {
        self.send_line(&format_line(cmd::PRIVMSG, [nick], Some(text)))
    }
    /// Sends a notice to a channel.
    pub fn channel_notice(&self, channel: &str, text: &str) -> bool {
        self.send_line(&format_line(cmd::NOTICE, [channel], Some(text)))
    }
    /// Sends a notice to a user.
    pub fn private_notice(&self, nick: &str, text: &str) -> bool {
        self.send_line(&format_line(cmd::NOTICE, [nick], Some(text)))
    }
    fn send_line(&self, line: &str) -> bool {
        self.inner.connection.send(line)
    }
}

impl Inner {
    fn set_phase(&self, phase: Phase) {
        *lock(&self.phase) = phase;
        self.phase_changed.notify_all();
    }
    /// Moves to [`Phase::Quitting`] unless already idle or quitting.
    fn begin_shutdown(&self) -> bool {
        let mut phase = lock(&self.phase);
        if matches!(*phase, Phase::Idle | Phase::Quitting) {
            return false;
        }
        *phase = Phase::Quitting;
        self.phase_changed.notify_all();
        true
    }
    fn change_nick(&self, nick: &str) -> bool {
        if !self.connection.is_connected() {
            return false;
        }
        let state = &self.session.state;
        state.push_new_nick(nick);
        if self.connection.send(&format_line(cmd::NICK, [nick], None)) {
            return true;
        }
        state.with::<NewNick, _>(|pending| {
            if pending.back().is_some_and(|n| n == nick) {
                pending.pop_back();
            }
        });
        false
    }
    fn load_plugins(&self) {
        let registry = lock(&self.registry).clone();
        let tasks = TaskSet::new(self.handle.clone());
        let manager = Arc::new(PluginManager::new(&registry, self.session.clone(), tasks));
        let protocol_sub = self.protocol.subscribe(Interest::All, manager.clone());
        let event_subs = manager
            .observers()
            .into_iter()
            .map(|observer| self.events.subscribe(Interest::All, observer))
            .collect();
        tracing::debug!(target: "ivybot", "loaded {} plugin(s)", manager.len());
        *lock(&self.running) = Some(Running { manager, protocol_sub, event_subs });
    }
    fn unload_plugins(&self) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };
        self.protocol.unsubscribe(running.protocol_sub);
        for id in running.event_subs {
            self.events.unsubscribe(id);
        }
        running.manager.teardown();
    }
    fn spawn_command_loop(self: &Arc<Self>) -> std::io::Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        let weak = Arc::downgrade(self);
        let queue = self.session.queue.clone();
        let stop2 = stop.clone();
        let thread = std::thread::Builder::new()
            .name("ivybot-commands".to_owned())
            .spawn(move || command_loop(weak, queue, stop2))?;
        *lock(&self.command_loop) = Some(CommandLoop { thread, stop });
        Ok(())
    }
    fn stop_command_loop(&self) {
        let Some(cl) = lock(&self.command_loop).take() else {
            return;
        };
        cl.stop.store(true, Ordering::Release);
        self.session.queue.push(Command::Halt);
        if cl.thread.thread().id() != std::thread::current().id() && cl.thread.join().is_err() {
            tracing::error!(target: "ivybot", "command loop panicked");
        }
    }
    /// Attempts one connection. Returns `true` on success.
    fn connect_once(&self) -> bool {
        let config = &self.session.config;
        let addr = config.host().and_then(|host| Ok((host, config.port()?)));
        let (host, port) = match addr {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!(target: "ivybot", "cannot connect: {e}");
                *lock(&self.fatal) = Some(e.into());
                return false;
            }
        };
        self.connection.connect(&host, port)
    }
    fn auto_reconnect(&self) -> bool {
        if lock(&self.fatal).is_some() || !self.reconnect.is_open() {
            return false;
        }
        self.session.config.auto_reconnect().unwrap_or_else(|e| {
            tracing::warn!(target: "ivybot", "not reconnecting: {e}");
            false
        })
    }
    /// Either schedules a reconnect or ends the session.
    fn after_connection_lost(self: &Arc<Self>) {
        if self.auto_reconnect() {
            {
                let mut phase = lock(&self.phase);
                if matches!(*phase, Phase::Idle | Phase::Quitting) {
                    return;
                }
                *phase = Phase::Reconnecting;
                self.phase_changed.notify_all();
            }
            let weak = Arc::downgrade(self);
            let spawned = std::thread::Builder::new()
                .name("ivybot-reconnect".to_owned())
                .spawn(move || reconnect_loop(weak));
            match spawned {
                Ok(_) => return,
                Err(e) => tracing::error!(target: "ivybot", "cannot reconnect: {e}"),
            }
        }
        if !self.begin_shutdown() {
            return;
        }
        self.reconnect.set(false);
        let mut fatal = lock(&self.fatal);
        if fatal.is_none() {
            *fatal = lock(&self.last_error).take().map(Error::Connection);
        }
        drop(fatal);
        self.end_session();
    }
    fn quit(&self, reason: Option<&str>) -> Result<(), Error> {
        if !self.begin_shutdown() {
            return Err(Error::NotRunning);
        }
        self.reconnect.set(false);
        tracing::info!(target: "ivybot", "quitting");
        if self.connection.is_connected() {
            self.connection.try_send(&format_line(cmd::QUIT, [], reason), QUIT_GRACE);
        }
        self.end_session();
        Ok(())
    }
    /// Unloads plugins, disconnects, and returns to [`Phase::Idle`].
    fn end_session(&self) {
        self.events.publish(&ClientEvent::Teardown);
        self.unload_plugins();
        self.events.cancel_pending();
        self.connection.disconnect();
        self.stop_command_loop();
        self.session.config.unlock();
        self.session.state.clear();
        self.set_phase(Phase::Idle);
        tracing::debug!(target: "ivybot", "session ended");
    }
    fn execute(&self, command: Command) {
        match command {
            Command::Nick(nick) => {
                self.change_nick(&nick);
            }
            Command::Quit(reason) => {
                if let Err(e) = self.quit(reason.as_deref()) {
                    tracing::debug!(target: "ivybot", "ignoring queued quit: {e}");
                }
            }
            Command::Fail(nick) => {
                tracing::error!(target: "ivybot", "registration failed: nick {nick} was rejected");
                *lock(&self.fatal) = Some(Error::RegistrationFailed(nick));
                let _ = self.quit(None);
            }
            Command::Halt => (),
            other => {
                if let Some(line) = other.line() {
                    self.connection.send(&line);
                }
            }
        }
    }
    fn on_connected(&self) {
        if !matches!(*lock(&self.phase), Phase::Connecting | Phase::Reconnecting) {
            tracing::debug!(target: "ivybot", "connected while not starting, closing");
            self.connection.disconnect();
            return;
        }
        let config = &self.session.config;
        config.lock();
        self.reconnect.set(true);
        let (user, realname, nick) = match registration(config) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(target: "ivybot", "cannot register: {e}");
                *lock(&self.fatal) = Some(e.into());
                self.session.queue.push(Command::Quit(None));
                return;
            }
        };
        self.connection.send(&format_line(cmd::USER, [user.as_str(), "0", "*"], Some(&realname)));
        self.session.state.remove::<NewNick>();
        self.change_nick(&nick);
        self.set_phase(Phase::Registering);
        self.events.publish(&ClientEvent::Connected);
    }
    fn on_disconnected(self: &Arc<Self>) {
        self.session.config.unlock();
        let state = &self.session.state;
        state.remove::<Nick>();
        state.remove::<NewNick>();
        state.remove::<Scratch>();
        tracing::info!(target: "ivybot", "disconnected");
        self.events.publish(&ClientEvent::Disconnected);
        if matches!(*lock(&self.phase), Phase::Idle | Phase::Quitting) {
            return;
        }
        // Ending the session joins other threads that may be waiting on this one.
        let this = self.clone();
        let spawned = std::thread::Builder::new()
            .name("ivybot-disconnect".to_owned())
            .spawn(move || this.after_connection_lost());
        if let Err(e) = spawned {
            tracing::error!(target: "ivybot", "cannot handle disconnect: {e}");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reconnect.set(false);
        self.connection.disconnect();
        if let Some(cl) = lock(&self.command_loop).take() {
            cl.stop.store(true, Ordering::Release);
            self.session.queue.push(Command::Halt);
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn registration(config: &Config) -> Result<(String, String, String), ConfigError> {
    Ok((config.user()?, config.realname()?, config.nick()?))
}

struct ConnectionObserver(Weak<Inner>);

impl Observer<ConnectionEvent> for ConnectionObserver {
    fn notify(&self, event: &ConnectionEvent) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        match event {
            ConnectionEvent::Connected => inner.on_connected(),
            ConnectionEvent::Disconnected => inner.on_disconnected(),
            ConnectionEvent::Data(line) => inner.handle_line(line),
            ConnectionEvent::Error(e) => {
                *lock(&inner.last_error) = Some(e.clone());
                inner.events.publish(&ClientEvent::ConnectionError(e.clone()));
            }
        }
    }
}

fn command_loop(inner: Weak<Inner>, queue: Arc<CommandQueue<Command>>, stop: Arc<AtomicBool>) {
    loop {
        let command = queue.dequeue();
        if matches!(command, Command::Halt) || stop.load(Ordering::Acquire) {
            break;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        tracing::debug!(target: "ivybot", "executing {command:?}");
        inner.execute(command);
        if stop.load(Ordering::Acquire) {
            break;
        }
    }
    tracing::debug!(target: "ivybot", "command loop stopped");
}

fn reconnect_loop(inner: Weak<Inner>) {
    loop {
        let Some((gate, wait)) = inner.upgrade().map(|inner| {
            let wait = inner.session.config.retry_wait().unwrap_or(Duration::from_secs(10));
            (inner.reconnect.clone(), wait)
        }) else {
            return;
        };
        tracing::info!(target: "ivybot", "reconnecting in {}s", wait.as_secs());
        if !gate.wait(wait) {
            tracing::debug!(target: "ivybot", "reconnect cancelled");
            return;
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.connect_once() {
            return;
        }
        if !inner.auto_reconnect() {
            inner.after_connection_lost();
            return;
        }
    }
}
