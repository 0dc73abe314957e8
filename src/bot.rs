//! The bot context handed to every plugin call.

use crate::config::Config;
use crate::db::Database;
use crate::error::{HandlerResult, PluginError};
use crate::identity::IdentityResolver;
use crate::outbound::{Outbound, Outbox};
use crate::plugins::{CommandDispatcher, PluginCatalog, PluginRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared bot state: configuration, identity resolver, plugin runtime and the
/// outbound queue. Created once at startup and passed down by reference.
pub struct Bot {
    pub config: Config,
    nick: RwLock<String>,
    pub identities: IdentityResolver,
    pub plugins: PluginRegistry,
    pub dispatcher: CommandDispatcher,
    pub outbox: Outbox,
    terminating: AtomicBool,
}

impl Bot {
    pub fn new(config: Config, db: Database, catalog: PluginCatalog, outbox: Outbox) -> Arc<Self> {
        Arc::new(Self {
            nick: RwLock::new(config.nick.clone()),
            identities: IdentityResolver::new(db),
            plugins: PluginRegistry::new(config.plugin_prefix(), catalog),
            dispatcher: CommandDispatcher::new(config.command_prefix.clone()),
            outbox,
            terminating: AtomicBool::new(false),
            config,
        })
    }

    /// The nick the bot currently uses.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn set_nick(&self, nick: &str) {
        *self.nick.write() = nick.to_string();
    }

    /// Switch to a new nick and tell the server.
    pub async fn change_nick(&self, nick: &str) -> HandlerResult {
        self.set_nick(nick);
        self.outbox.send(Outbound::Nick(nick.to_string())).await
    }

    /// Send QUIT and stop reconnecting.
    pub async fn quit(&self, message: Option<&str>) -> HandlerResult {
        self.terminating.store(true, Ordering::SeqCst);
        self.outbox.quit(message).await
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    pub fn set_terminating(&self) {
        self.terminating.store(true, Ordering::SeqCst);
    }

    pub fn load_plugin(self: &Arc<Self>, name: &str) -> Result<(), PluginError> {
        self.plugins.load(self, name)
    }

    pub fn unload_plugin(&self, name: &str) -> Result<(), PluginError> {
        self.plugins.unload(name)
    }

    /// A bot on a fresh in-memory store, with the outbound receiver.
    #[cfg(test)]
    pub(crate) async fn for_tests(
        catalog: PluginCatalog,
    ) -> (Arc<Self>, tokio::sync::mpsc::Receiver<Outbound>) {
        let db = Database::new(":memory:").await.unwrap();
        let (outbox, rx) = Outbox::channel(64);
        (Self::new(Config::default(), db, catalog, outbox), rx)
    }
}
