//! Plugin registry: load, unload and query plugin modules.
//!
//! A plugin is either fully loaded (instances constructed, hooks run, command
//! table built) or absent. A failed load tears down whatever it had built
//! before returning the error.
//!
//! Modules are compiled in, so there is no import cache to evict: every load
//! resolves the module from the catalog and runs its constructor afresh.

use super::{Plugin, PluginCatalog, PluginInstance};
use crate::bot::Bot;
use crate::error::PluginError;
use crate::telemetry::spans;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One row of a plugin's command table.
#[derive(Clone)]
pub struct CommandEntry {
    pub plugin: Arc<dyn Plugin>,
    /// Command name handed back to [`Plugin::handle_command`].
    pub command: &'static str,
    pub help: Option<&'static str>,
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("plugin", &self.plugin.name())
            .field("command", &self.command)
            .finish()
    }
}

/// Read-only view of one loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSummary {
    /// Qualified name, e.g. `plugins.admin`.
    pub name: String,
    /// Names of the live instances.
    pub instances: Vec<&'static str>,
    /// Registered keywords in registration order.
    pub keywords: Vec<String>,
}

impl PluginSummary {
    /// The part of the qualified name after the first `.`.
    pub fn human_name(&self) -> &str {
        human_name(&self.name)
    }
}

pub(crate) fn human_name(qualified: &str) -> &str {
    qualified.split_once('.').map_or(qualified, |(_, rest)| rest)
}

struct LoadedPlugin {
    name: String,
    instances: Vec<PluginInstance>,
    /// Keyword to entry; keywords unique, insertion ordered.
    commands: Vec<(String, CommandEntry)>,
}

impl LoadedPlugin {
    fn command(&self, keyword: &str) -> Option<&CommandEntry> {
        self.commands
            .iter()
            .find(|(kw, _)| kw == keyword)
            .map(|(_, entry)| entry)
    }

    fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.name.clone(),
            instances: self.instances.iter().map(|i| i.plugin.name()).collect(),
            keywords: self.commands.iter().map(|(kw, _)| kw.clone()).collect(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Loaded plugins in load order. Command lookups walk this order.
    plugins: Vec<LoadedPlugin>,
}

/// Owns every loaded plugin and its command table.
pub struct PluginRegistry {
    prefix: String,
    catalog: PluginCatalog,
    state: RwLock<RegistryState>,
}

impl PluginRegistry {
    /// `prefix` namespaces plugin names (`plugins` gives `plugins.admin`).
    pub fn new(prefix: impl Into<String>, catalog: PluginCatalog) -> Self {
        Self {
            prefix: prefix.into(),
            catalog,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Qualified name for a plugin given either bare or already qualified.
    pub fn qualify(&self, name: &str) -> String {
        match name.strip_prefix(&self.prefix).and_then(|rest| rest.strip_prefix('.')) {
            Some(_) => name.to_string(),
            None => format!("{}.{}", self.prefix, name),
        }
    }

    /// Load a plugin by name, unloading it first if it is already loaded.
    pub fn load(&self, bot: &Arc<Bot>, name: &str) -> Result<(), PluginError> {
        let qualified = self.qualify(name);
        let _span = spans::plugin("load", &qualified).entered();

        if self.is_loaded(&qualified) {
            info!(plugin = %qualified, "Unloading before reload");
            if let Err(e) = self.unload(&qualified) {
                warn!(plugin = %qualified, error = %e, "Unload before reload reported errors");
            }
        }

        let result = self.try_load(bot, &qualified);
        if let Err(e) = &result {
            error!(plugin = %qualified, error = %e, "Failed to load");
        }
        result
    }

    fn try_load(&self, bot: &Arc<Bot>, qualified: &str) -> Result<(), PluginError> {
        let short = human_name(qualified);
        let module = self
            .catalog
            .find(short)
            .ok_or_else(|| PluginError::NotFound(qualified.to_string()))?;

        let settings = bot.config.settings_for(short);
        let instances = (module.construct)(bot, &settings)?;
        if instances.is_empty() {
            return Err(PluginError::NoPlugins(qualified.to_string()));
        }

        for (index, instance) in instances.iter().enumerate() {
            let Some(register) = &instance.lifecycle.register else {
                continue;
            };
            if let Err(e) = register() {
                // Instances before `index` are registered; tear everything down.
                let failures = teardown(&instances, index);
                for failure in failures {
                    warn!(plugin = %qualified, error = %failure, "Teardown after failed load");
                }
                return Err(PluginError::Hook {
                    plugin: qualified.to_string(),
                    hook: "register",
                    reason: e.to_string(),
                });
            }
            info!(plugin = %qualified, instance = instance.plugin.name(), "Registered");
        }

        let mut commands: Vec<(String, CommandEntry)> = Vec::new();
        for instance in &instances {
            for spec in instance.plugin.commands() {
                for keyword in spec.keywords {
                    let entry = CommandEntry {
                        plugin: instance.plugin.clone(),
                        command: spec.name,
                        help: spec.help,
                    };
                    match commands.iter_mut().find(|(kw, _)| kw == keyword) {
                        Some(slot) => slot.1 = entry,
                        None => commands.push((keyword.to_string(), entry)),
                    }
                    info!(plugin = %qualified, command = %keyword, "Added command");
                }
            }
        }

        let loaded = LoadedPlugin {
            name: qualified.to_string(),
            instances,
            commands,
        };
        for instance in &loaded.instances {
            info!(plugin = %qualified, instance = instance.plugin.name(), "Loaded");
        }

        let mut state = self.state.write();
        state.plugins.retain(|p| p.name != qualified);
        state.plugins.push(loaded);
        Ok(())
    }

    /// Unload a plugin: run its teardown hooks and drop all bookkeeping.
    ///
    /// Bookkeeping is cleared even when hooks fail; the failures are returned
    /// together as [`PluginError::Cleanup`].
    pub fn unload(&self, name: &str) -> Result<(), PluginError> {
        let qualified = self.qualify(name);
        let _span = spans::plugin("unload", &qualified).entered();

        let removed = {
            let mut state = self.state.write();
            state
                .plugins
                .iter()
                .position(|p| p.name == qualified)
                .map(|index| state.plugins.remove(index))
        };

        let Some(plugin) = removed else {
            return Err(PluginError::NotLoaded(qualified));
        };

        let count = plugin.instances.len();
        let failures = teardown(&plugin.instances, count);
        drop(plugin);
        info!(plugin = %qualified, "Clean complete");

        if failures.is_empty() {
            info!(plugin = %qualified, "Unload complete");
            Ok(())
        } else {
            error!(plugin = %qualified, failures = failures.len(), "Unload finished with errors");
            Err(PluginError::Cleanup {
                plugin: qualified,
                failures,
            })
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let qualified = self.qualify(name);
        self.state.read().plugins.iter().any(|p| p.name == qualified)
    }

    /// Snapshot of every loaded plugin in load order.
    pub fn query(&self) -> Vec<PluginSummary> {
        self.state.read().plugins.iter().map(LoadedPlugin::summary).collect()
    }

    /// First plugin, in load order, whose table contains `keyword`.
    pub fn lookup(&self, keyword: &str) -> Option<(String, CommandEntry)> {
        self.state
            .read()
            .plugins
            .iter()
            .find_map(|p| p.command(keyword).map(|entry| (p.name.clone(), entry.clone())))
    }

    /// Every plugin containing `keyword`, with that keyword's help text.
    pub fn help_entries(&self, keyword: &str) -> Vec<(String, Option<&'static str>)> {
        self.state
            .read()
            .plugins
            .iter()
            .filter_map(|p| p.command(keyword).map(|entry| (p.name.clone(), entry.help)))
            .collect()
    }

    /// Instances subscribed to semantic events, in load order.
    pub fn subscribers(&self) -> Vec<Arc<dyn Plugin>> {
        self.state
            .read()
            .plugins
            .iter()
            .flat_map(|p| p.instances.iter())
            .filter(|i| i.events)
            .map(|i| i.plugin.clone())
            .collect()
    }

    /// Unload everything, newest first.
    pub fn unload_all(&self) {
        let names: Vec<String> = self.state.read().plugins.iter().rev().map(|p| p.name.clone()).collect();
        for name in names {
            if let Err(e) = self.unload(&name) {
                warn!(plugin = %name, error = %e, "Unload at shutdown failed");
            }
        }
    }

}

/// Run unregister (for the first `registered` instances) and cleanup hooks
/// for every instance, collecting failures.
fn teardown(instances: &[PluginInstance], registered: usize) -> Vec<String> {
    let mut failures = Vec::new();
    for (index, instance) in instances.iter().enumerate() {
        let name = instance.plugin.name();
        if index < registered
            && let Some(unregister) = &instance.lifecycle.unregister
            && let Err(e) = unregister()
        {
            failures.push(format!("{}: unregister: {}", name, e));
        }
        if let Some(cleanup) = &instance.lifecycle.cleanup
            && let Err(e) = cleanup()
        {
            failures.push(format!("{}: cleanup: {}", name, e));
        }
    }
    failures
}
