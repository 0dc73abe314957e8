//! User identity: wire observations, resolved actors and the resolver.
//!
//! An [`Observation`] is what one protocol event tells us about its sender.
//! The [`IdentityResolver`] turns observations into stable [`UserId`]s backed
//! by the identity store, and an [`Actor`] carries both to plugins.

mod resolver;

pub use crate::db::{User, UserId};
pub use resolver::{IdentityResolver, MergeOutcome};

/// One wire-level sighting of a sender. Never persisted.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub nick: Option<String>,
    pub ident: Option<String>,
    pub hostname: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl Observation {
    pub fn new(nick: &str, ident: &str, hostname: &str) -> Self {
        Self {
            nick: non_empty(Some(nick)),
            ident: non_empty(Some(ident)),
            hostname: non_empty(Some(hostname)),
        }
    }

    /// An observation carrying only a nickname (e.g. a kick or mode target).
    pub fn nick_only(nick: &str) -> Self {
        Self {
            nick: non_empty(Some(nick)),
            ..Self::default()
        }
    }

    /// Parse a `nick!ident@host` source. A bare name becomes a nick-only observation.
    pub fn from_source(source: &str) -> Self {
        match source.split_once('!') {
            Some((nick, rest)) => {
                let (ident, host) = rest.split_once('@').unwrap_or((rest, ""));
                Self::new(nick, ident, host)
            }
            None => match source.split_once('@') {
                Some((nick, host)) => Self {
                    nick: non_empty(Some(nick)),
                    ident: None,
                    hostname: non_empty(Some(host)),
                },
                None => Self::nick_only(source),
            },
        }
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// `ident@hostname`, only when both halves are present.
    pub fn hostmask(&self) -> Option<String> {
        match (&self.ident, &self.hostname) {
            (Some(ident), Some(host)) => Some(format!("{}@{}", ident, host)),
            _ => None,
        }
    }
}

/// A sender or target as seen by plugins: wire fields plus the resolved id.
///
/// `user_id` is `None` when the actor is unseen or its identity is in conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub nick: String,
    pub ident: Option<String>,
    pub hostname: Option<String>,
    pub user_id: Option<UserId>,
}

impl Actor {
    pub fn from_observation(observation: &Observation, user_id: Option<UserId>) -> Self {
        Self {
            nick: observation.nick.clone().unwrap_or_default(),
            ident: observation.ident.clone(),
            hostname: observation.hostname.clone(),
            user_id,
        }
    }

    /// Rebuild an actor from a stored user's last known nick and host.
    pub fn from_user(user: &User) -> Self {
        Self {
            nick: user.last_nick.clone(),
            ident: non_empty(Some(user.ident())),
            hostname: non_empty(Some(user.hostname())),
            user_id: Some(user.id),
        }
    }

    /// A nick we know nothing else about.
    pub fn unknown(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            ..Self::default()
        }
    }

    /// `nick!ident@host` with `*` for unknown parts.
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            self.nick,
            self.ident.as_deref().unwrap_or("*"),
            self.hostname.as_deref().unwrap_or("*")
        )
    }
}
