//! Telemetry utilities for event and command tracing.

/// Standardized span constructors for bot observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one event taken off the queue.
    pub fn event(kind: &str) -> Span {
        info_span!("event", kind = %kind)
    }

    /// Create a span for a command invocation.
    pub fn command(keyword: &str, nick: &str, target: &str) -> Span {
        info_span!("command", keyword = %keyword, nick = %nick, target = %target)
    }

    /// Create a span for a plugin lifecycle operation.
    pub fn plugin(operation: &str, name: &str) -> Span {
        info_span!("plugin", op = %operation, name = %name)
    }
}
