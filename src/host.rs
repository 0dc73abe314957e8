//! Host event loop.
//!
//! One task drains the event queue and handles each [`HostEvent`] to
//! completion before taking the next. Protocol events are translated into
//! [`BotEvent`]s with their senders resolved, text goes through the command
//! dispatcher, and every subscribed plugin sees the semantic event.
//!
//! Storage faults end the loop. Any other handler error is logged and the
//! loop moves on to the next event.

use crate::bot::Bot;
use crate::error::HandlerError;
use crate::events::{BotEvent, HostEvent, ProtocolEvent};
use crate::identity::{Actor, Observation};
use crate::outbound::{Outbound, is_channel};
use crate::telemetry::spans;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, warn};

/// QUIT message used when the process is told to stop.
pub const SHUTDOWN_MESSAGE: &str = "Received SIGTERM, terminating...";

/// Whether the loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Host {
    bot: Arc<Bot>,
    events: mpsc::Receiver<HostEvent>,
}

impl Host {
    pub fn new(bot: Arc<Bot>, events: mpsc::Receiver<HostEvent>) -> Self {
        Self { bot, events }
    }

    /// Request the first connection, then process events until told to stop.
    pub async fn run(mut self) -> Result<(), HandlerError> {
        self.request_connect().await?;

        while let Some(event) = self.events.recv().await {
            let span = spans::event(event_kind(&event));
            match self.handle(event).instrument(span).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, code = e.error_code(), "Fatal error, stopping event loop");
                    self.bot.plugins.unload_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), "Handler failed");
                }
            }
        }

        info!("Event loop finished");
        self.bot.plugins.unload_all();
        Ok(())
    }

    /// Handle one queued event.
    pub async fn handle(&self, event: HostEvent) -> Result<Flow, HandlerError> {
        match event {
            HostEvent::Protocol(event) => self.translate(event).await,
            HostEvent::Keepalive => {
                let token = format!("LAG{}", chrono::Utc::now().timestamp_millis());
                debug!(token = %token, "Keepalive");
                self.bot.outbox.send(Outbound::Ping(token)).await?;
                Ok(Flow::Continue)
            }
            HostEvent::Shutdown => {
                info!("Shutdown requested");
                self.bot.quit(Some(SHUTDOWN_MESSAGE)).await?;
                self.deliver(BotEvent::Exit).await?;
                Ok(Flow::Stop)
            }
        }
    }

    async fn request_connect(&self) -> Result<(), HandlerError> {
        let config = &self.bot.config;
        self.bot
            .outbox
            .send(Outbound::Connect {
                network: config.network.clone(),
                port: config.port,
            })
            .await
    }

    async fn translate(&self, event: ProtocolEvent) -> Result<Flow, HandlerError> {
        let bot = &self.bot;
        let ids = &bot.identities;

        let semantic = match event {
            ProtocolEvent::Connected { network, port } => {
                bot.outbox.send(Outbound::Nick(bot.nick())).await?;
                bot.outbox
                    .send(Outbound::User {
                        username: bot.config.username.clone(),
                        realname: bot.config.realname.clone(),
                    })
                    .await?;
                BotEvent::Logon { network, port }
            }
            ProtocolEvent::Disconnected => {
                self.deliver(BotEvent::Disconnect).await?;
                if bot.is_terminating() {
                    self.deliver(BotEvent::Exit).await?;
                    return Ok(Flow::Stop);
                }
                self.deliver(BotEvent::Reconnect).await?;
                self.request_connect().await?;
                return Ok(Flow::Continue);
            }
            ProtocolEvent::Ping { token } => {
                bot.outbox.send(Outbound::Pong(token)).await?;
                return Ok(Flow::Continue);
            }
            ProtocolEvent::Privmsg { source, target, text } => {
                let sender = ids.actor(&source).await?;
                match ctcp_action(&text) {
                    Some(body) => BotEvent::Action {
                        sender,
                        target,
                        message: body.to_string(),
                    },
                    None => {
                        bot.dispatcher.dispatch(bot, &sender, &target, &text).await?;
                        BotEvent::Text {
                            sender,
                            target,
                            message: text,
                        }
                    }
                }
            }
            ProtocolEvent::Notice { source, target, text } => BotEvent::Notice {
                sender: ids.actor(&source).await?,
                target,
                message: text,
            },
            ProtocolEvent::Join { source, channel } => BotEvent::Join {
                sender: ids.actor(&source).await?,
                channel,
            },
            ProtocolEvent::Part { source, channel, message } => BotEvent::Part {
                sender: ids.actor(&source).await?,
                channel,
                message: message.unwrap_or_default(),
            },
            ProtocolEvent::Quit { source, message } => BotEvent::Quit {
                sender: ids.actor(&source).await?,
                message: message.unwrap_or_default(),
            },
            ProtocolEvent::Kick {
                source,
                channel,
                target,
                message,
            } => BotEvent::Kick {
                sender: ids.actor(&source).await?,
                target: ids.actor_by_nick(&target).await?,
                channel,
                message: message.unwrap_or_default(),
            },
            ProtocolEvent::Nick { source, new_nick } => {
                let user_id = ids.changed_nick(&source, &new_nick).await?;
                if source.nick().is_some_and(|old| old == bot.nick()) {
                    bot.set_nick(&new_nick);
                }
                BotEvent::Nick {
                    sender: Actor::from_observation(&source, user_id),
                    new_nick,
                }
            }
            ProtocolEvent::Topic { source, channel, topic } => BotEvent::Topic {
                sender: ids.actor(&source).await?,
                channel,
                topic,
            },
            ProtocolEvent::Invite { source, channel } => {
                let user_id = match source.nick() {
                    Some(nick) => ids.resolve_nick(nick).await?,
                    None => None,
                };
                BotEvent::Invite {
                    sender: Actor::from_observation(&source, user_id),
                    channel,
                }
            }
            ProtocolEvent::Mode {
                source,
                target,
                mode,
                args,
            } => match self.translate_mode(&source, target, mode, args).await? {
                Some(event) => event,
                None => return Ok(Flow::Continue),
            },
            ProtocolEvent::Numeric { code, args } => return self.numeric(code, &args).await,
        };

        self.deliver(semantic).await?;
        Ok(Flow::Continue)
    }

    async fn translate_mode(
        &self,
        source: &Observation,
        channel: String,
        mode: String,
        args: Vec<String>,
    ) -> Result<Option<BotEvent>, HandlerError> {
        let ids = &self.bot.identities;
        let sender = ids.actor(source).await?;
        let first = args.first().cloned().unwrap_or_default();

        let event = match mode.as_str() {
            "+b" => BotEvent::Ban {
                sender,
                mask: first,
                channel,
            },
            "-b" => BotEvent::Unban {
                sender,
                mask: first,
                channel,
            },
            "+o" | "-o" | "+v" | "-v" | "+q" | "-q" => {
                let target = ids.actor_by_nick(&first).await?;
                match mode.as_str() {
                    "+o" => BotEvent::Op { sender, target, channel },
                    "-o" => BotEvent::Deop { sender, target, channel },
                    "+v" => BotEvent::Voice { sender, target, channel },
                    "-v" => BotEvent::Devoice { sender, target, channel },
                    "+q" => BotEvent::Owner { sender, target, channel },
                    _ => BotEvent::Deowner { sender, target, channel },
                }
            }
            _ if is_channel(&channel) => BotEvent::Mode {
                sender,
                mode,
                target: channel,
            },
            // User modes on ourselves.
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    async fn numeric(&self, code: u16, args: &[String]) -> Result<Flow, HandlerError> {
        let bot = &self.bot;
        match code {
            // ERR_NICKNAMEINUSE
            433 => {
                let attempted = args.get(1).cloned().unwrap_or_else(|| bot.nick());
                let next = format!("{}_", attempted);
                info!(nick = %next, "Nickname in use, retrying");
                bot.change_nick(&next).await?;
            }
            // RPL_ENDOFMOTD, ERR_NOMOTD
            376 | 422 => {
                self.deliver(BotEvent::Connect {
                    network: bot.config.network.clone(),
                    port: bot.config.port,
                })
                .await?;
                for channel in &bot.config.channels {
                    bot.outbox.join(channel, None).await?;
                }
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    /// Fan a semantic event out to every subscribed plugin instance.
    ///
    /// A failing subscriber does not stop delivery to the rest unless the
    /// failure is fatal.
    pub async fn deliver(&self, event: BotEvent) -> Result<(), HandlerError> {
        debug!(event = ?event, "Delivering");
        for plugin in self.bot.plugins.subscribers() {
            if let Err(e) = plugin.on_event(&self.bot, &event).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(plugin = plugin.name(), event = event.kind(), error = %e, "Event handler failed");
            }
        }
        Ok(())
    }
}

fn event_kind(event: &HostEvent) -> &'static str {
    match event {
        HostEvent::Protocol(event) => event.kind(),
        HostEvent::Keepalive => "keepalive",
        HostEvent::Shutdown => "shutdown",
    }
}

/// Body of a CTCP ACTION, if `text` is one.
fn ctcp_action(text: &str) -> Option<&str> {
    text.strip_prefix("\x01ACTION ")
        .map(|body| body.strip_suffix('\x01').unwrap_or(body))
}
