//! pancakesbot - a plugin-driven chat bot core.
//!
//! Two subsystems do the real work: the plugin runtime ([`plugins`]), which
//! loads command handlers and routes chat lines to them, and the identity
//! resolver ([`identity`]), which maps nick/ident/host sightings onto stable
//! user ids kept in a SQLite store ([`db`]). The [`host`] event loop ties them
//! to a line transport ([`network`]).

pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod host;
pub mod identity;
pub mod network;
pub mod outbound;
pub mod plugins;
pub mod telemetry;

pub use bot::Bot;
pub use config::Config;
pub use db::{Database, StorageError};
pub use error::{HandlerError, HandlerResult, PluginError};
pub use host::Host;
