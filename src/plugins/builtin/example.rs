//! Example plugin.
//!
//! Exposes a command for every outbound action so each can be tried from a
//! channel, and logs every semantic event it receives. Also a starting point
//! for writing new plugins.

use crate::bot::Bot;
use crate::error::HandlerResult;
use crate::events::BotEvent;
use crate::identity::Actor;
use crate::outbound::is_channel;
use crate::plugins::{CommandSpec, Plugin, PluginInstance, PluginModule};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const INVALID_ARGS: &str = "Invalid number of arguments";
const UNKNOWN_USER: &str = "Nickname not of a known user.";

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "test",
        keywords: &["test", "t"],
        help: Some("Command used to test. Replies with user's ID.\nUsage: test"),
    },
    CommandSpec {
        name: "ban",
        keywords: &["ban"],
        help: Some("Bans the given nickname from the current channel.\nUsage: ban nickname"),
    },
    CommandSpec {
        name: "unban",
        keywords: &["unban"],
        help: Some("Unbans the given nickname from the current channel.\nUsage: unban nickname"),
    },
    CommandSpec {
        name: "op",
        keywords: &["op"],
        help: Some("Give operator privileges to user in current channel.\nUsage: op nickname"),
    },
    CommandSpec {
        name: "deop",
        keywords: &["deop"],
        help: Some("Remove operator privileges from user in current channel.\nUsage: deop nickname"),
    },
    CommandSpec {
        name: "voice",
        keywords: &["voice"],
        help: Some("Give user voice privileges in current channel.\nUsage: voice nickname"),
    },
    CommandSpec {
        name: "devoice",
        keywords: &["devoice"],
        help: Some("Remove voice privileges from user in current channel.\nUsage: devoice nickname"),
    },
    CommandSpec {
        name: "invite",
        keywords: &["invite"],
        help: Some("Invites given nickname to given channel.\nUsage: invite nickname channel"),
    },
    CommandSpec {
        name: "join",
        keywords: &["join"],
        help: Some("Joins the given channel (with key if needed).\nUsage: join channel [key]"),
    },
    CommandSpec {
        name: "kick",
        keywords: &["kick"],
        help: Some("Kicks the given user from current channel with optional message.\nUsage: kick nick [message]"),
    },
    CommandSpec {
        name: "me",
        keywords: &["me"],
        help: Some("Says an ACTION in the current channel.\nUsage: me message"),
    },
    CommandSpec {
        name: "msg",
        keywords: &["msg"],
        help: Some("Messages the given target (channel or nick).\nUsage: msg target message"),
    },
    CommandSpec {
        name: "nick",
        keywords: &["nick"],
        help: Some("Sets the nickname of the bot.\nUsage: nick new_nickname"),
    },
    CommandSpec {
        name: "notice",
        keywords: &["notice"],
        help: Some("Notices the given target (channel or nick).\nUsage: notice target message"),
    },
    CommandSpec {
        name: "part",
        keywords: &["part"],
        help: Some("Parts the given channel (with message if given).\nUsage: part channel [message]"),
    },
    CommandSpec {
        name: "topic",
        keywords: &["topic"],
        help: Some("Sets the topic of current channel.\nUsage: topic new_topic"),
    },
    CommandSpec {
        name: "quit",
        keywords: &["quit"],
        help: Some("Makes the bot quit with an optional message.\nUsage: quit [message]"),
    },
];

pub fn module() -> PluginModule {
    PluginModule::new("example", |_, _| {
        info!("Example plugin loaded");
        Ok(vec![
            PluginInstance::new(ExamplePlugin)
                .with_events()
                .on_cleanup(|| {
                    info!("Example plugin cleaned up");
                    Ok(())
                }),
        ])
    })
}

pub struct ExamplePlugin;

impl ExamplePlugin {
    /// Ban or unban a nick known to the identity store.
    async fn ban(&self, bot: &Arc<Bot>, sender: &Actor, target: &str, args: &[&str], set: bool) -> HandlerResult {
        let [nick] = args else {
            return bot.outbox.reply(sender, target, INVALID_ARGS).await;
        };
        let user = bot.identities.actor_by_nick(nick).await?;
        if user.user_id.is_none() {
            return bot.outbox.reply(sender, target, UNKNOWN_USER).await;
        }
        if set {
            bot.outbox.ban_user(target, &user).await
        } else {
            bot.outbox.unban_user(target, &user).await
        }
    }
}

#[async_trait]
impl Plugin for ExamplePlugin {
    fn name(&self) -> &'static str {
        "ExamplePlugin"
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
        message: &str,
    ) -> HandlerResult {
        let args: Vec<&str> = message.split(' ').filter(|a| !a.is_empty()).collect();
        let in_channel = is_channel(target);
        let outbox = &bot.outbox;

        match (command, args.as_slice()) {
            ("test", _) => {
                let id = sender.user_id.map_or_else(|| "None".to_string(), |id| id.to_string());
                info!(nick = %sender.nick, user_id = %id, channel = %target, text = %message, "Test fired");
                outbox
                    .reply(sender, target, &format!("Test Fired by {} (ID {})", sender.nick, id))
                    .await
            }
            ("ban", _) if in_channel => self.ban(bot, sender, target, &args, true).await,
            ("unban", _) if in_channel => self.ban(bot, sender, target, &args, false).await,
            ("op", [nick, ..]) if in_channel => outbox.op(target, nick).await,
            ("deop", [nick, ..]) if in_channel => outbox.deop(target, nick).await,
            ("voice", [nick, ..]) if in_channel => outbox.voice(target, nick).await,
            ("devoice", [nick, ..]) if in_channel => outbox.devoice(target, nick).await,
            ("invite", [nick, channel]) => outbox.invite(nick, channel).await,
            ("join", [channel]) => outbox.join(channel, None).await,
            ("join", [channel, key]) => outbox.join(channel, Some(*key)).await,
            ("kick", [nick]) if in_channel => outbox.kick(target, nick, None).await,
            ("kick", [nick, rest @ ..]) if in_channel => {
                outbox.kick(target, nick, Some(rest.join(" ").as_str())).await
            }
            ("me", _) => outbox.me(target, message).await,
            ("msg", [to, rest @ ..]) if !rest.is_empty() => outbox.msg(to, &rest.join(" ")).await,
            ("notice", [to, rest @ ..]) if !rest.is_empty() => outbox.notice(to, &rest.join(" ")).await,
            ("nick", [nick]) => bot.change_nick(nick).await,
            ("part", [channel]) => outbox.part(channel, None).await,
            ("part", [channel, rest @ ..]) => outbox.part(channel, Some(rest.join(" ").as_str())).await,
            ("topic", _) if in_channel && !message.is_empty() => outbox.topic(target, Some(message)).await,
            ("quit", _) => bot.quit((!message.is_empty()).then_some(message)).await,
            ("invite" | "join" | "msg" | "notice" | "nick" | "part", _) => {
                outbox.reply(sender, target, INVALID_ARGS).await
            }
            ("kick", []) if in_channel => outbox.reply(sender, target, INVALID_ARGS).await,
            _ => Ok(()),
        }
    }

    async fn on_event(&self, _bot: &Arc<Bot>, event: &BotEvent) -> HandlerResult {
        match event {
            BotEvent::Text { sender, target, message } => {
                info!("TEXT: {}@{}: {}", sender.nick, target, message)
            }
            BotEvent::Action { sender, target, message } => {
                info!("ACTION: {}({:?})@{}: {}", sender.nick, sender.user_id, target, message)
            }
            BotEvent::Notice { sender, target, message } => {
                info!("NOTICE: {}@{}: {}", sender.nick, target, message)
            }
            BotEvent::Join { sender, channel } => info!("JOIN: {} has joined {}", sender.nick, channel),
            BotEvent::Part { sender, channel, message } => {
                info!("PART: {} parted from {}: {}", sender.nick, channel, message)
            }
            BotEvent::Quit { sender, message } => info!("QUIT: {} has quit: {}", sender.nick, message),
            BotEvent::Kick { sender, target, channel, message } => {
                info!("KICK: {} kicked {} from {}: {}", sender.nick, target.nick, channel, message)
            }
            BotEvent::Nick { sender, new_nick } => {
                info!("NICK: {} changed nick to {}", sender.nick, new_nick)
            }
            BotEvent::Topic { sender, channel, topic } => {
                info!("TOPIC: {} set topic of {} to {}", sender.nick, channel, topic)
            }
            BotEvent::Invite { sender, channel } => {
                info!("INVITE: {} invited us to {}", sender.nick, channel)
            }
            BotEvent::Ban { sender, mask, channel } => {
                info!("BAN: {} banned {} in {}", sender.nick, mask, channel)
            }
            BotEvent::Unban { sender, mask, channel } => {
                info!("UNBAN: {} unbanned {} from {}", sender.nick, mask, channel)
            }
            BotEvent::Op { sender, target, channel } => {
                info!("OP: {} opped {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Deop { sender, target, channel } => {
                info!("DEOP: {} deopped {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Voice { sender, target, channel } => {
                info!("VOICE: {} voiced {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Devoice { sender, target, channel } => {
                info!("DEVOICE: {} devoiced {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Owner { sender, target, channel } => {
                info!("OWNER: {} ownered {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Deowner { sender, target, channel } => {
                info!("DEOWNER: {} deownered {} in {}", sender.nick, target.nick, channel)
            }
            BotEvent::Mode { sender, mode, target } => {
                info!("MODE: {} set mode {} on {}", sender.nick, mode, target)
            }
            BotEvent::Logon { network, port } => info!("LOGON: {}:{}", network, port),
            BotEvent::Connect { network, port } => info!("Connect: {}:{}", network, port),
            BotEvent::Disconnect => info!("DISCONNECT"),
            BotEvent::Reconnect => info!("RECONNECT"),
            BotEvent::Exit => info!("EXIT"),
        }
        Ok(())
    }
}
