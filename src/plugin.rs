//! Plugins: independently pluggable handlers for protocol messages and client events.
//!
//! A plugin type is registered in a [`PluginRegistry`] against the protocol events it wants.
//! Each time a client starts, its [`PluginManager`] builds exactly one instance of every
//! registered type and routes messages to them.

pub mod core;
mod manager;

pub use manager::{PluginManager, TEARDOWN_GRACE};

use crate::{
    client::{ClientEvent, Command, CommandQueue},
    config::Config,
    ircmsg::{handler_name, Message},
    state::ClientState,
};
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Everything a plugin instance may touch: the outbound queue, the config, and the state.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Queue of commands for the client to execute.
    pub queue: Arc<CommandQueue<Command>>,
    /// The client's configuration.
    pub config: Arc<Config>,
    /// The client's runtime state.
    pub state: Arc<ClientState>,
}

impl Session {
    /// Queues a command for the client.
    pub fn send(&self, cmd: Command) {
        self.queue.push(cmd);
    }
}

/// A function handling one kind of protocol message.
pub type HandlerFn<P> = fn(&mut P, &Message);

/// The protocol message handlers a plugin type implements.
///
/// Handlers are keyed by [`handler_name`], so `"001"`, `"m001"` and
/// `"PRIVMSG"`/`"privmsg"` may be used interchangeably when adding them.
pub struct HandlerTable<P> {
    handlers: HashMap<String, HandlerFn<P>>,
}

impl<P> Default for HandlerTable<P> {
    fn default() -> Self {
        HandlerTable { handlers: HashMap::new() }
    }
}

impl<P> std::fmt::Debug for HandlerTable<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl<P> HandlerTable<P> {
    /// Adds a handler for messages of kind `event`, replacing any previous one.
    pub fn on(&mut self, event: &str, handler: HandlerFn<P>) -> &mut Self {
        self.handlers.insert(handler_name(event), handler);
        self
    }
    /// Returns the handler with the provided handler name.
    pub fn get(&self, name: &str) -> Option<HandlerFn<P>> {
        self.handlers.get(name).copied()
    }
    /// Returns `true` if there is a handler with the provided handler name.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
    /// Returns the names of every handler.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.keys().map(String::as_str)
    }
}

/// Plugins.
///
/// Every method but [`new`][Plugin::new] has a do-nothing default,
/// so a plugin implements only what it needs.
/// No two methods are ever called concurrently on the same instance.
pub trait Plugin: Send + 'static {
    /// Creates this plugin's instance for one client session.
    fn new(session: Session) -> Self
    where
        Self: Sized;
    /// Adds this plugin type's protocol message handlers.
    ///
    /// Called once per instance, right after [`new`][Plugin::new].
    fn handlers(_table: &mut HandlerTable<Self>)
    where
        Self: Sized,
    {
    }
    /// Handles one high-level client event.
    fn event(&mut self, _event: &ClientEvent) {}
    /// Releases resources before the instance is dropped.
    fn teardown(&mut self) {}
    /// A human-readable name for logs.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// Type-erased plugin instances.
pub(crate) trait AnyPlugin: Send {
    fn handler_names(&self) -> BTreeSet<String>;
    fn invoke(&mut self, handler: &str, msg: &Message) -> bool;
    fn event(&mut self, event: &ClientEvent);
    fn teardown(&mut self);
}

struct Instance<P> {
    plugin: P,
    table: HandlerTable<P>,
}

impl<P: Plugin> AnyPlugin for Instance<P> {
    fn handler_names(&self) -> BTreeSet<String> {
        self.table.names().map(str::to_owned).collect()
    }

    fn invoke(&mut self, handler: &str, msg: &Message) -> bool {
        if let Some(f) = self.table.get(handler) {
            f(&mut self.plugin, msg);
            true
        } else {
            false
        }
    }

    fn event(&mut self, event: &ClientEvent) {
        self.plugin.event(event);
    }

    fn teardown(&mut self) {
        self.plugin.teardown();
    }
}

fn build<P: Plugin>(session: Session) -> Box<dyn AnyPlugin> {
    let plugin = P::new(session);
    let mut table = HandlerTable::default();
    P::handlers(&mut table);
    Box::new(Instance { plugin, table })
}

#[derive(Clone)]
pub(crate) struct PluginType {
    id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) events: BTreeSet<String>,
    pub(crate) build: fn(Session) -> Box<dyn AnyPlugin>,
}

/// The table of plugin types and the protocol events each wants.
///
/// Registries are plain values: create one, register types into it,
/// and hand it to a client before starting it.
/// Each client start takes its own snapshot.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    types: Vec<PluginType>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_map();
        for ty in &self.types {
            f.entry(&ty.name, &ty.events);
        }
        f.finish()
    }
}

impl PluginRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates a registry containing only [`CorePlugin`][self::core::CorePlugin].
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        registry.register::<self::core::CorePlugin, &str>([]);
        registry
    }
    /// Registers interest from plugin type `P` in the provided protocol events.
    ///
    /// Events may be given as command tokens (`"PRIVMSG"`, `"001"`) or handler names.
    /// Registering the same type again adds to its events.
    /// A type registered with no events is still instantiated
    /// and still receives [client events][Plugin::event].
    pub fn register<P: Plugin, S: AsRef<str>>(
        &mut self,
        events: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let id = TypeId::of::<P>();
        let idx = match self.types.iter().position(|ty| ty.id == id) {
            Some(idx) => idx,
            None => {
                let ty =
                    PluginType { id, name: P::name(), events: BTreeSet::new(), build: build::<P> };
                self.types.push(ty);
                self.types.len() - 1
            }
        };
        self.types[idx].events.extend(events.into_iter().map(|e| handler_name(e.as_ref())));
        self
    }
    /// Returns `true` if `P` has been registered.
    pub fn contains<P: Plugin>(&self) -> bool {
        self.types.iter().any(|ty| ty.id == TypeId::of::<P>())
    }
    /// Returns the handler names `P` is registered for.
    pub fn events<P: Plugin>(&self) -> Option<Vec<String>> {
        let ty = self.types.iter().find(|ty| ty.id == TypeId::of::<P>())?;
        Some(ty.events.iter().cloned().collect())
    }
    /// Returns how many plugin types are registered.
    pub fn len(&self) -> usize {
        self.types.len()
    }
    /// Returns `true` if no plugin types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
    pub(crate) fn types(&self) -> &[PluginType] {
        &self.types
    }
}
