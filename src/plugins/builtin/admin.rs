//! Admin plugin: plugin and user management.
//!
//! Every command is restricted to the user whose resolved id equals
//! `admin_id` (configured under `plugin_settings.admin`, default 1). Anyone
//! else is ignored without a reply.

use crate::bot::Bot;
use crate::error::{HandlerResult, PluginError};
use crate::events::BotEvent;
use crate::identity::{Actor, MergeOutcome, UserId};
use crate::plugins::registry::human_name;
use crate::plugins::{CommandSpec, Plugin, PluginInstance, PluginModule};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "load",
        keywords: &["load"],
        help: Some("Loads (or reloads) plugins.\nUsage: load plugin [plugin ...]"),
    },
    CommandSpec {
        name: "unload",
        keywords: &["unload"],
        help: Some("Unloads plugins.\nUsage: unload plugin [plugin ...]"),
    },
    CommandSpec {
        name: "query",
        keywords: &["query"],
        help: Some("Lists loaded plugins.\nUsage: query"),
    },
    CommandSpec {
        name: "merge",
        keywords: &["merge"],
        help: Some("Merges two users, given as nicknames or ids.\nUsage: merge a b"),
    },
    CommandSpec {
        name: "ids",
        keywords: &["ids"],
        help: Some("Lists every known user.\nUsage: ids"),
    },
];

fn default_admin_id() -> UserId {
    1
}

#[derive(Debug, Deserialize)]
struct AdminSettings {
    #[serde(default = "default_admin_id")]
    admin_id: UserId,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            admin_id: default_admin_id(),
        }
    }
}

pub fn module() -> PluginModule {
    PluginModule::new("admin", |_bot, settings| {
        let settings = if settings.is_null() {
            AdminSettings::default()
        } else {
            AdminSettings::deserialize(settings).map_err(|e| PluginError::construct(e.to_string()))?
        };
        Ok(vec![PluginInstance::new(AdminPlugin {
            admin_id: settings.admin_id,
        })])
    })
}

pub struct AdminPlugin {
    admin_id: UserId,
}

impl AdminPlugin {
    async fn load(&self, bot: &Arc<Bot>, sender: &Actor, target: &str, names: &[&str]) -> HandlerResult {
        if names.is_empty() {
            return bot.outbox.reply(sender, target, "No plugins given.").await;
        }
        for name in names {
            let reply = match bot.load_plugin(name) {
                Ok(()) => format!("Plugin \"{}\" Successfully Loaded.", name),
                Err(e) => format!("Plugin \"{}\" Failed to Load - {}.", name, e),
            };
            bot.outbox.reply(sender, target, &reply).await?;
        }
        Ok(())
    }

    async fn unload(&self, bot: &Arc<Bot>, sender: &Actor, target: &str, names: &[&str]) -> HandlerResult {
        if names.is_empty() {
            return bot.outbox.reply(sender, target, "No plugins given.").await;
        }
        for name in names {
            let reply = match bot.unload_plugin(name) {
                Ok(()) => format!("Plugin \"{}\" Successfully Unloaded.", name),
                Err(e) => format!("Plugin \"{}\" Failed to Unload - {}.", name, e),
            };
            bot.outbox.reply(sender, target, &reply).await?;
        }
        Ok(())
    }

    async fn query(&self, bot: &Arc<Bot>, sender: &Actor, target: &str) -> HandlerResult {
        let names: Vec<String> = bot
            .plugins
            .query()
            .iter()
            .map(|p| human_name(&p.name).to_string())
            .collect();
        let reply = format!("Loaded Plugins: {}", names.join(", "));
        bot.outbox.reply(sender, target, &reply).await
    }

    async fn merge(&self, bot: &Arc<Bot>, sender: &Actor, target: &str, args: &[&str]) -> HandlerResult {
        let [a, b] = args else {
            return bot
                .outbox
                .reply(sender, target, "Merging requires two nicknames.")
                .await;
        };

        let merging = format!("Merging records of {} and {}.", a, b);
        if let (Ok(id_a), Ok(id_b)) = (a.parse::<UserId>(), b.parse::<UserId>()) {
            let merged = bot.identities.merge(id_a, id_b).await?;
            info!(a = id_a, b = id_b, merged, "Admin merge by id");
            let reply = if id_a == id_b {
                format!("{} and {} are already merged.", a, b)
            } else if merged {
                merging
            } else {
                "Nickname not of a known user.".to_string()
            };
            return bot.outbox.reply(sender, target, &reply).await;
        }

        let reply = match bot.identities.merge_nicks(a, b).await? {
            MergeOutcome::Merged { from, to } => {
                info!(from, to, "Admin merge by nick");
                merging
            }
            MergeOutcome::AlreadyMerged => format!("{} and {} are already merged.", a, b),
            MergeOutcome::Unknown => "Nickname not of a known user.".to_string(),
        };
        bot.outbox.reply(sender, target, &reply).await
    }

    async fn ids(&self, bot: &Arc<Bot>, sender: &Actor, target: &str) -> HandlerResult {
        for user in bot.identities.users().await? {
            let line = format!("{} : {}!{}@{}", user.id, user.last_nick, user.ident(), user.hostname());
            bot.outbox.reply(sender, target, &line).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for AdminPlugin {
    fn name(&self) -> &'static str {
        "AdminPlugin"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn handle_command(
        &self,
        bot: &Arc<Bot>,
        command: &str,
        sender: &Actor,
        target: &str,
        args: &str,
    ) -> HandlerResult {
        if sender.user_id != Some(self.admin_id) {
            debug!(nick = %sender.nick, user_id = ?sender.user_id, command, "Admin command refused");
            return Ok(());
        }

        let args: Vec<&str> = args.split(' ').filter(|a| !a.is_empty()).collect();
        match command {
            "load" => self.load(bot, sender, target, &args).await,
            "unload" => self.unload(bot, sender, target, &args).await,
            "query" => self.query(bot, sender, target).await,
            "merge" => self.merge(bot, sender, target, &args).await,
            "ids" => self.ids(bot, sender, target).await,
            _ => Ok(()),
        }
    }

    async fn on_event(&self, _bot: &Arc<Bot>, _event: &BotEvent) -> HandlerResult {
        Ok(())
    }
}
