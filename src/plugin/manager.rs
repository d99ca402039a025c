use super::{AnyPlugin, PluginRegistry, Session};
use crate::{
    client::ClientEvent,
    ircmsg::Message,
    notify::{tasks::TaskSet, Observer},
    util::{lock, panic_message},
};
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// How long [`PluginManager::teardown`] waits for a busy plugin before skipping its hook.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// One live plugin instance.
pub(crate) struct PluginCell {
    name: &'static str,
    handlers: BTreeSet<String>,
    plugin: Mutex<Box<dyn AnyPlugin>>,
    // Completion signal of the most recent invocation dispatched to this plugin.
    last: Mutex<Option<oneshot::Receiver<()>>>,
}

impl PluginCell {
    fn responds_to(&self, handler: &str) -> bool {
        self.handlers.contains(handler)
    }

    fn teardown(&self) {
        let deadline = Instant::now() + TEARDOWN_GRACE;
        let mut plugin = loop {
            match self.plugin.try_lock() {
                Ok(guard) => break guard,
                Err(TryLockError::Poisoned(e)) => break e.into_inner(),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(TryLockError::WouldBlock) => {
                    let name = self.name;
                    tracing::warn!(target: "ivybot", "plugin {name} is busy, skipping teardown");
                    return;
                }
            }
        };
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| plugin.teardown()));
        if let Err(payload) = result {
            let msg = panic_message(payload.as_ref());
            tracing::error!(target: "ivybot", "plugin {} panicked in teardown: {msg}", self.name);
        }
    }
}

impl Observer<ClientEvent> for PluginCell {
    fn notify(&self, event: &ClientEvent) {
        lock(&self.plugin).event(event);
    }
}

#[derive(Default)]
struct Tables {
    plugins: Vec<Arc<PluginCell>>,
    index: HashMap<String, Vec<Arc<PluginCell>>>,
}

/// The live plugin instances of one client session.
///
/// Every registered plugin type is instantiated exactly once.
/// Each protocol message is handed to every interested instance on its own task,
/// and each instance handles its messages one at a time in arrival order.
pub struct PluginManager {
    tables: Mutex<Tables>,
    tasks: TaskSet,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = lock(&self.tables);
        let names: Vec<_> = tables.plugins.iter().map(|p| p.name).collect();
        f.debug_struct("PluginManager")
            .field("plugins", &names)
            .field("tasks", &self.tasks)
            .finish()
    }
}

impl PluginManager {
    /// Instantiates every plugin type in `registry`.
    ///
    /// Handler invocations are spawned into `tasks`.
    pub fn new(registry: &PluginRegistry, session: Session, tasks: TaskSet) -> Self {
        let mut tables = Tables::default();
        for ty in registry.types() {
            let plugin = (ty.build)(session.clone());
            let cell = Arc::new(PluginCell {
                name: ty.name,
                handlers: plugin.handler_names(),
                plugin: Mutex::new(plugin),
                last: Mutex::new(None),
            });
            for event in &ty.events {
                tables.index.entry(event.clone()).or_default().push(cell.clone());
            }
            tracing::debug!(target: "ivybot", "loaded plugin {}", ty.name);
            tables.plugins.push(cell);
        }
        PluginManager { tables: Mutex::new(tables), tasks }
    }
    /// Returns how many plugin instances are live.
    pub fn len(&self) -> usize {
        lock(&self.tables).plugins.len()
    }
    /// Returns `true` if there are no live plugin instances.
    pub fn is_empty(&self) -> bool {
        lock(&self.tables).plugins.is_empty()
    }
    /// Returns the task set handler invocations are spawned into.
    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }
    /// Hands `msg` to every plugin registered for it that has a matching handler.
    ///
    /// Returns the number of invocations started.
    pub fn dispatch(&self, msg: &Message) -> usize {
        let handler = msg.handler_name();
        let tables = lock(&self.tables);
        let Some(cells) = tables.index.get(&handler) else {
            return 0;
        };
        let msg = Arc::new(msg.clone());
        let mut count = 0usize;
        for cell in cells.iter().filter(|cell| cell.responds_to(&handler)) {
            let (done, next) = oneshot::channel();
            let prev = lock(&cell.last).replace(next);
            let label = format!("{}::{handler} ({})", cell.name, msg.raw);
            let cell = cell.clone();
            let msg = msg.clone();
            let handler = handler.clone();
            self.tasks.spawn(label, async move {
                if let Some(prev) = prev {
                    // An error only means the previous invocation was cancelled or panicked.
                    let _ = prev.await;
                }
                lock(&cell.plugin).invoke(&handler, &msg);
                let _ = done.send(());
            });
            count += 1;
        }
        if count == 0 {
            tracing::trace!(target: "ivybot", "no plugin handles {handler}");
        }
        count
    }
    /// Cancels every in-flight invocation, calls every plugin's teardown hook,
    /// and drops every instance.
    ///
    /// The manager is inert afterwards. Calling this more than once is harmless.
    pub fn teardown(&self) {
        let mut tables = lock(&self.tables);
        self.tasks.cancel_all();
        for cell in &tables.plugins {
            cell.teardown();
        }
        if !tables.plugins.is_empty() {
            tracing::debug!(target: "ivybot", "tore down {} plugin(s)", tables.plugins.len());
        }
        *tables = Tables::default();
    }
    /// Returns every plugin instance as a client event observer.
    pub(crate) fn observers(&self) -> Vec<Arc<dyn Observer<ClientEvent>>> {
        let tables = lock(&self.tables);
        tables.plugins.iter().map(|cell| cell.clone() as Arc<dyn Observer<ClientEvent>>).collect()
    }
}

impl Observer<Message> for PluginManager {
    fn notify(&self, msg: &Message) {
        self.dispatch(msg);
    }
}
