//! Greets whoever asks.

use crate::bot::Bot;
use crate::error::HandlerResult;
use crate::events::BotEvent;
use crate::identity::Actor;
use crate::plugins::{CommandSpec, Plugin, PluginInstance, PluginModule};
use async_trait::async_trait;
use std::sync::Arc;

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "greet",
    keywords: &["greet", "hi"],
    help: Some("Says hello and tells you who the bot thinks you are.\nUsage: greet"),
}];

pub fn module() -> PluginModule {
    PluginModule::new("greet", |_, _| Ok(vec![PluginInstance::new(GreetPlugin)]))
}

pub struct GreetPlugin;

#[async_trait]
impl Plugin for GreetPlugin {
    fn name(&self) -> &'static str {
        "GreetPlugin"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn handle_command(
        &self,
        bot: &Arc<Bot>,
        _command: &str,
        sender: &Actor,
        target: &str,
        _args: &str,
    ) -> HandlerResult {
        let reply = match sender.user_id {
            Some(id) => format!("Hello, {} (ID {})!", sender.nick, id),
            None => format!("Hello, {}! I don't know you yet.", sender.nick),
        };
        bot.outbox.reply(sender, target, &reply).await
    }

    async fn on_event(&self, _bot: &Arc<Bot>, _event: &BotEvent) -> HandlerResult {
        Ok(())
    }
}
