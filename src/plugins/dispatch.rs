//! Command dispatcher.
//!
//! A chat line is a command when it starts with the command prefix or with
//! `"<bot nick>: "`. The first word is the keyword and the rest of the line is
//! passed to the handler untouched. `help` is answered here.

use super::registry::human_name;
use crate::bot::Bot;
use crate::error::HandlerError;
use crate::identity::Actor;
use crate::telemetry::spans;
use std::sync::Arc;
use tracing::{Instrument, info};

/// What the dispatcher did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Plain chat.
    Ignored,
    /// Built-in help was answered.
    Help,
    /// A plugin command ran.
    Invoked { plugin: String, command: String },
    /// Looked like a command but no plugin has the keyword.
    Unmatched { keyword: String },
}

pub struct CommandDispatcher {
    prefix: String,
}

impl CommandDispatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Strip the command marker from `text`, if it has one.
    fn command_body<'a>(&self, nick: &str, text: &'a str) -> Option<&'a str> {
        if !self.prefix.is_empty()
            && let Some(body) = text.strip_prefix(self.prefix.as_str())
        {
            return Some(body);
        }
        text.strip_prefix(nick)
            .and_then(|rest| rest.strip_prefix(": "))
    }

    /// Route one chat line.
    ///
    /// Handler errors are returned as-is; the caller decides what to do.
    pub async fn dispatch(
        &self,
        bot: &Arc<Bot>,
        sender: &Actor,
        target: &str,
        text: &str,
    ) -> Result<Dispatch, HandlerError> {
        let nick = bot.nick();
        let Some(body) = self.command_body(&nick, text) else {
            return Ok(Dispatch::Ignored);
        };
        let (keyword, args) = body.split_once(' ').unwrap_or((body, ""));

        if keyword == "help" {
            self.help(bot, sender, target, args).await?;
            return Ok(Dispatch::Help);
        }

        let Some((plugin, entry)) = bot.plugins.lookup(keyword) else {
            return Ok(Dispatch::Unmatched {
                keyword: keyword.to_string(),
            });
        };

        info!(
            user = %sender.nick,
            user_id = ?sender.user_id,
            command = %keyword,
            plugin = %plugin,
            "Executing command"
        );
        entry
            .plugin
            .handle_command(bot, entry.command, sender, target, args)
            .instrument(spans::command(keyword, &sender.nick, target))
            .await?;

        Ok(Dispatch::Invoked {
            plugin,
            command: entry.command.to_string(),
        })
    }

    async fn help(&self, bot: &Arc<Bot>, sender: &Actor, target: &str, args: &str) -> Result<(), HandlerError> {
        if args.trim().is_empty() {
            for plugin in bot.plugins.query() {
                let keywords: Vec<String> = plugin
                    .keywords
                    .iter()
                    .map(|kw| format!("{}{}", self.prefix, kw))
                    .collect();
                let line = format!("{}: {}", plugin.human_name(), keywords.join(", "));
                bot.outbox.reply(sender, target, &line).await?;
            }
            return Ok(());
        }

        for arg in args.split(' ').filter(|a| !a.is_empty()) {
            let keyword = arg.strip_prefix(self.prefix.as_str()).unwrap_or(arg);
            for (plugin, help) in bot.plugins.help_entries(keyword) {
                let reply = match help {
                    Some(doc) => format!("{}: {}", keyword, doc),
                    None => "No help text.".to_string(),
                };
                tracing::debug!(plugin = human_name(&plugin), keyword = %keyword, "Help requested");
                bot.outbox.reply(sender, target, &reply).await?;
            }
        }
        Ok(())
    }
}
