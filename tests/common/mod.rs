//! Integration test common infrastructure.
//!
//! A fake IRC server the bot connects to, and a helper that starts the bot's
//! transport and event loop against it.

pub mod server;

pub use server::{FakeServer, start_bot};
