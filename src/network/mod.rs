//! Network module.
//!
//! A minimal line transport: one TCP connection, line framing, and a
//! translation between protocol lines and the core's event types.

mod client;
mod codec;
pub mod line;

pub use client::Client;
