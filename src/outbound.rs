//! Outbound action requests.
//!
//! The core never writes to the socket. It queues [`Outbound`] requests on an
//! [`Outbox`], and the transport turns them into protocol lines.

use crate::error::HandlerResult;
use crate::identity::Actor;
use tokio::sync::mpsc;

/// A request for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Open (or reopen) the connection.
    Connect { network: String, port: u16 },
    /// Registration: USER line.
    User { username: String, realname: String },
    Nick(String),
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
    Mode {
        target: String,
        mode: String,
        args: Vec<String>,
    },
    Join {
        channels: String,
        keys: Option<String>,
    },
    Part {
        channels: String,
        message: Option<String>,
    },
    Invite { nick: String, channel: String },
    Kick {
        channel: String,
        nick: String,
        comment: Option<String>,
    },
    Topic {
        channel: String,
        topic: Option<String>,
    },
    Ping(String),
    Pong(String),
    Quit(Option<String>),
}

/// Whether a target names a channel rather than a user.
pub fn is_channel(target: &str) -> bool {
    target.starts_with('#')
}

/// Sending half of the outbound queue, with the convenience actions plugins use.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Outbound>,
}

impl Outbox {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    /// Create an outbox and the receiver the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, outbound: Outbound) -> HandlerResult {
        self.tx.send(outbound).await?;
        Ok(())
    }

    /// PRIVMSG, one line per `\n`-separated line of `text`.
    pub async fn msg(&self, target: &str, text: &str) -> HandlerResult {
        for line in text.split('\n') {
            self.send(Outbound::Privmsg {
                target: target.to_string(),
                text: line.to_string(),
            })
            .await?;
        }
        Ok(())
    }

    /// CTCP ACTION (`/me`), one per line.
    pub async fn me(&self, target: &str, text: &str) -> HandlerResult {
        for line in text.split('\n') {
            self.send(Outbound::Privmsg {
                target: target.to_string(),
                text: format!("\x01ACTION {}\x01", line),
            })
            .await?;
        }
        Ok(())
    }

    pub async fn notice(&self, target: &str, text: &str) -> HandlerResult {
        for line in text.split('\n') {
            self.send(Outbound::Notice {
                target: target.to_string(),
                text: line.to_string(),
            })
            .await?;
        }
        Ok(())
    }

    /// Answer where a message came from: the channel, or the sender for private messages.
    pub async fn reply(&self, sender: &Actor, target: &str, text: &str) -> HandlerResult {
        if is_channel(target) {
            self.msg(target, text).await
        } else {
            self.msg(&sender.nick, text).await
        }
    }

    pub async fn mode(&self, target: &str, mode: &str, args: &[&str]) -> HandlerResult {
        self.send(Outbound::Mode {
            target: target.to_string(),
            mode: mode.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
        .await
    }

    /// Ban a raw mask.
    pub async fn ban(&self, channel: &str, mask: &str) -> HandlerResult {
        self.mode(channel, "+b", &[mask]).await
    }

    pub async fn unban(&self, channel: &str, mask: &str) -> HandlerResult {
        self.mode(channel, "-b", &[mask]).await
    }

    /// Ban a known user by hostname (`*!*@host`), falling back to the nick.
    pub async fn ban_user(&self, channel: &str, user: &Actor) -> HandlerResult {
        self.ban(channel, &host_ban_mask(user)).await
    }

    pub async fn unban_user(&self, channel: &str, user: &Actor) -> HandlerResult {
        self.unban(channel, &host_ban_mask(user)).await
    }

    pub async fn op(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "+o", &[nick]).await
    }

    pub async fn deop(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "-o", &[nick]).await
    }

    pub async fn voice(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "+v", &[nick]).await
    }

    pub async fn devoice(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "-v", &[nick]).await
    }

    pub async fn owner(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "+q", &[nick]).await
    }

    pub async fn deowner(&self, channel: &str, nick: &str) -> HandlerResult {
        self.mode(channel, "-q", &[nick]).await
    }

    pub async fn invite(&self, nick: &str, channel: &str) -> HandlerResult {
        self.send(Outbound::Invite {
            nick: nick.to_string(),
            channel: channel.to_string(),
        })
        .await
    }

    pub async fn join(&self, channels: &str, keys: Option<&str>) -> HandlerResult {
        self.send(Outbound::Join {
            channels: channels.to_string(),
            keys: keys.map(str::to_string),
        })
        .await
    }

    pub async fn part(&self, channels: &str, message: Option<&str>) -> HandlerResult {
        self.send(Outbound::Part {
            channels: channels.to_string(),
            message: message.map(str::to_string),
        })
        .await
    }

    pub async fn kick(&self, channel: &str, nick: &str, comment: Option<&str>) -> HandlerResult {
        self.send(Outbound::Kick {
            channel: channel.to_string(),
            nick: nick.to_string(),
            comment: comment.map(str::to_string),
        })
        .await
    }

    pub async fn topic(&self, channel: &str, topic: Option<&str>) -> HandlerResult {
        self.send(Outbound::Topic {
            channel: channel.to_string(),
            topic: topic.map(str::to_string),
        })
        .await
    }

    pub async fn quit(&self, message: Option<&str>) -> HandlerResult {
        self.send(Outbound::Quit(message.map(str::to_string))).await
    }
}

fn host_ban_mask(user: &Actor) -> String {
    match &user.hostname {
        Some(host) => format!("*!*@{}", host),
        None => user.nick.clone(),
    }
}
