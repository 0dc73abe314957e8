//! Event types crossing the core's boundaries.
//!
//! - [`ProtocolEvent`]: already-parsed callbacks from the transport.
//! - [`BotEvent`]: semantic events delivered to plugins, senders resolved.
//! - [`HostEvent`]: everything the event loop's single queue carries.

use crate::identity::{Actor, Observation};

/// Raw protocol callbacks, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Connected { network: String, port: u16 },
    Disconnected,
    Privmsg {
        source: Observation,
        target: String,
        text: String,
    },
    Notice {
        source: Observation,
        target: String,
        text: String,
    },
    Join { source: Observation, channel: String },
    Part {
        source: Observation,
        channel: String,
        message: Option<String>,
    },
    Quit {
        source: Observation,
        message: Option<String>,
    },
    Kick {
        source: Observation,
        channel: String,
        target: String,
        message: Option<String>,
    },
    Mode {
        source: Observation,
        target: String,
        mode: String,
        args: Vec<String>,
    },
    Nick { source: Observation, new_nick: String },
    Topic {
        source: Observation,
        channel: String,
        topic: String,
    },
    Invite { source: Observation, channel: String },
    Numeric { code: u16, args: Vec<String> },
    Ping { token: String },
}

impl ProtocolEvent {
    /// Short label for spans and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected => "disconnected",
            Self::Privmsg { .. } => "privmsg",
            Self::Notice { .. } => "notice",
            Self::Join { .. } => "join",
            Self::Part { .. } => "part",
            Self::Quit { .. } => "quit",
            Self::Kick { .. } => "kick",
            Self::Mode { .. } => "mode",
            Self::Nick { .. } => "nick",
            Self::Topic { .. } => "topic",
            Self::Invite { .. } => "invite",
            Self::Numeric { .. } => "numeric",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Semantic events fanned out to subscribed plugin instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// Channel or private message (also routed to the command dispatcher).
    Text {
        sender: Actor,
        target: String,
        message: String,
    },
    /// `/me` action; `message` is the action body.
    Action {
        sender: Actor,
        target: String,
        message: String,
    },
    Notice {
        sender: Actor,
        target: String,
        message: String,
    },
    Join { sender: Actor, channel: String },
    Part {
        sender: Actor,
        channel: String,
        message: String,
    },
    Quit { sender: Actor, message: String },
    Kick {
        sender: Actor,
        target: Actor,
        channel: String,
        message: String,
    },
    Nick { sender: Actor, new_nick: String },
    Topic {
        sender: Actor,
        channel: String,
        topic: String,
    },
    Invite { sender: Actor, channel: String },
    Ban {
        sender: Actor,
        mask: String,
        channel: String,
    },
    Unban {
        sender: Actor,
        mask: String,
        channel: String,
    },
    Op {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    Deop {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    Voice {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    Devoice {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    Owner {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    Deowner {
        sender: Actor,
        target: Actor,
        channel: String,
    },
    /// Any other channel mode change.
    Mode {
        sender: Actor,
        mode: String,
        target: String,
    },
    /// NICK and USER sent to the server.
    Logon { network: String, port: u16 },
    /// Registration finished (end of MOTD).
    Connect { network: String, port: u16 },
    Disconnect,
    Reconnect,
    Exit,
}

impl BotEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Action { .. } => "action",
            Self::Notice { .. } => "notice",
            Self::Join { .. } => "join",
            Self::Part { .. } => "part",
            Self::Quit { .. } => "quit",
            Self::Kick { .. } => "kick",
            Self::Nick { .. } => "nick",
            Self::Topic { .. } => "topic",
            Self::Invite { .. } => "invite",
            Self::Ban { .. } => "ban",
            Self::Unban { .. } => "unban",
            Self::Op { .. } => "op",
            Self::Deop { .. } => "deop",
            Self::Voice { .. } => "voice",
            Self::Devoice { .. } => "devoice",
            Self::Owner { .. } => "owner",
            Self::Deowner { .. } => "deowner",
            Self::Mode { .. } => "mode",
            Self::Logon { .. } => "logon",
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::Exit => "exit",
        }
    }
}

/// Items on the event loop's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Protocol(ProtocolEvent),
    /// Periodic keep-alive tick; no special priority.
    Keepalive,
    /// Process is shutting down (signal).
    Shutdown,
}

impl From<ProtocolEvent> for HostEvent {
    fn from(event: ProtocolEvent) -> Self {
        Self::Protocol(event)
    }
}
