//! Plugin runtime.
//!
//! Plugins are compiled in. Each one is a [`PluginModule`]: a name plus a
//! constructor that builds one or more [`PluginInstance`]s. The
//! [`PluginRegistry`] loads and unloads modules by name, and the
//! [`CommandDispatcher`] routes chat lines to the commands they declare.
//!
//! A plugin implements [`Plugin`]. It declares its commands as static
//! [`CommandSpec`]s; optional lifecycle hooks live in [`Lifecycle`] and are
//! simply absent when a plugin has nothing to do at that point.

pub mod builtin;
mod dispatch;
mod registry;

pub use dispatch::{CommandDispatcher, Dispatch};
pub use registry::{CommandEntry, PluginRegistry, PluginSummary};

use crate::bot::Bot;
use crate::error::{HandlerResult, PluginError};
use crate::events::BotEvent;
use crate::identity::Actor;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A command a plugin answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Name passed back to [`Plugin::handle_command`].
    pub name: &'static str,
    /// Keywords (without prefix) that invoke this command.
    pub keywords: &'static [&'static str],
    /// Help text shown by `help <keyword>`. May span several lines.
    pub help: Option<&'static str>,
}

/// The plugin capability.
///
/// Handlers receive the bot context on every call instead of storing it, so
/// an instance never keeps the bot alive.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Instance name, used in logs.
    fn name(&self) -> &'static str;

    /// Commands this instance exposes. Empty for event-only plugins.
    fn commands(&self) -> &'static [CommandSpec] {
        &[]
    }

    /// Run the command registered as `command`.
    ///
    /// `args` is the remainder of the line after the keyword, verbatim.
    async fn handle_command(
        &self,
        bot: &Arc<Bot>,
        command: &str,
        sender: &Actor,
        target: &str,
        args: &str,
    ) -> HandlerResult;

    /// Receive a semantic event. Only called for subscribed instances.
    async fn on_event(&self, bot: &Arc<Bot>, event: &BotEvent) -> HandlerResult;
}

/// A lifecycle callback.
pub type Hook = Box<dyn Fn() -> Result<(), PluginError> + Send + Sync>;

/// Optional lifecycle hooks of one instance.
#[derive(Default)]
pub struct Lifecycle {
    /// Runs once the instance is constructed, before its commands go live.
    pub register: Option<Hook>,
    /// Runs on unload, before `cleanup`.
    pub unregister: Option<Hook>,
    /// Releases resources on unload.
    pub cleanup: Option<Hook>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("register", &self.register.is_some())
            .field("unregister", &self.unregister.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// One constructed plugin object with its hooks.
pub struct PluginInstance {
    pub plugin: Arc<dyn Plugin>,
    pub lifecycle: Lifecycle,
    /// Whether the instance receives [`BotEvent`]s.
    pub events: bool,
}

impl PluginInstance {
    /// A command-only instance with no hooks.
    pub fn new(plugin: impl Plugin + 'static) -> Self {
        Self {
            plugin: Arc::new(plugin),
            lifecycle: Lifecycle::default(),
            events: false,
        }
    }

    /// Subscribe the instance to semantic events.
    pub fn with_events(mut self) -> Self {
        self.events = true;
        self
    }

    pub fn on_register(mut self, hook: impl Fn() -> Result<(), PluginError> + Send + Sync + 'static) -> Self {
        self.lifecycle.register = Some(Box::new(hook));
        self
    }

    pub fn on_unregister(
        mut self,
        hook: impl Fn() -> Result<(), PluginError> + Send + Sync + 'static,
    ) -> Self {
        self.lifecycle.unregister = Some(Box::new(hook));
        self
    }

    pub fn on_cleanup(mut self, hook: impl Fn() -> Result<(), PluginError> + Send + Sync + 'static) -> Self {
        self.lifecycle.cleanup = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("plugin", &self.plugin.name())
            .field("lifecycle", &self.lifecycle)
            .field("events", &self.events)
            .finish()
    }
}

/// Constructor of a plugin module: bot context and configured settings in,
/// instances out.
pub type Constructor =
    Arc<dyn Fn(&Arc<Bot>, &serde_json::Value) -> Result<Vec<PluginInstance>, PluginError> + Send + Sync>;

/// A loadable unit of plugins.
#[derive(Clone)]
pub struct PluginModule {
    pub name: &'static str,
    pub construct: Constructor,
}

impl PluginModule {
    pub fn new(
        name: &'static str,
        construct: impl Fn(&Arc<Bot>, &serde_json::Value) -> Result<Vec<PluginInstance>, PluginError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name,
            construct: Arc::new(construct),
        }
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule").field("name", &self.name).finish()
    }
}

/// The set of modules that can be loaded by name.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    modules: Vec<PluginModule>,
}

impl PluginCatalog {
    pub fn new(modules: Vec<PluginModule>) -> Self {
        Self { modules }
    }

    /// Add a module, replacing one with the same name.
    pub fn register(&mut self, module: PluginModule) {
        self.modules.retain(|m| m.name != module.name);
        self.modules.push(module);
    }

    pub fn find(&self, name: &str) -> Option<PluginModule> {
        self.modules.iter().find(|m| m.name == name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.iter().map(|m| m.name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Plugins for exercising the runtime in tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every command and event it sees.
    pub struct Recorder {
        pub label: &'static str,
        pub commands: &'static [CommandSpec],
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn commands(&self) -> &'static [CommandSpec] {
            self.commands
        }

        async fn handle_command(
            &self,
            _bot: &Arc<Bot>,
            command: &str,
            sender: &Actor,
            target: &str,
            args: &str,
        ) -> HandlerResult {
            self.calls.lock().push(format!(
                "{}:{} {}@{} [{}] id={:?}",
                self.label, command, sender.nick, target, args, sender.user_id
            ));
            Ok(())
        }

        async fn on_event(&self, _bot: &Arc<Bot>, event: &BotEvent) -> HandlerResult {
            self.calls.lock().push(format!("{}:event {}", self.label, event.kind()));
            Ok(())
        }
    }

    /// Counts lifecycle hook invocations.
    #[derive(Debug, Default)]
    pub struct HookCounts {
        pub register: AtomicUsize,
        pub unregister: AtomicUsize,
        pub cleanup: AtomicUsize,
    }

    impl HookCounts {
        pub fn get(&self) -> (usize, usize, usize) {
            (
                self.register.load(Ordering::SeqCst),
                self.unregister.load(Ordering::SeqCst),
                self.cleanup.load(Ordering::SeqCst),
            )
        }
    }

    /// A subscribed recorder whose hooks bump `counts`.
    pub fn counted(recorder: Recorder, counts: &Arc<HookCounts>) -> PluginInstance {
        let (r, u, c) = (counts.clone(), counts.clone(), counts.clone());
        PluginInstance::new(recorder)
            .with_events()
            .on_register(move || {
                r.register.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_unregister(move || {
                u.unregister.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_cleanup(move || {
                c.cleanup.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
    }
}
