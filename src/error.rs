//! Unified error handling for pancakesbot.
//!
//! Storage faults live in [`crate::db::StorageError`] next to sqlx. This module
//! holds the plugin lifecycle errors and the errors a handler body may return.

use crate::db::StorageError;
use crate::outbound::Outbound;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// Plugin Errors (load/unload)
// ============================================================================

/// Plugin load/unload failures.
///
/// Recoverable: reported to whoever asked for the load or unload, with the
/// registry rolled back to its pre-attempt state.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no plugin module named \"{0}\"")]
    NotFound(String),

    #[error("plugin \"{0}\" is not loaded")]
    NotLoaded(String),

    #[error("no plugins defined in module \"{0}\"")]
    NoPlugins(String),

    #[error("failed to construct plugin: {0}")]
    Construct(String),

    #[error("{hook} hook failed for {plugin}: {reason}")]
    Hook {
        plugin: String,
        hook: &'static str,
        reason: String,
    },

    #[error("unload of {plugin} finished with errors: {}", .failures.join("; "))]
    Cleanup {
        plugin: String,
        failures: Vec<String>,
    },
}

impl PluginError {
    /// Shorthand for constructor failures.
    pub fn construct(reason: impl Into<String>) -> Self {
        Self::Construct(reason.into())
    }
}

// ============================================================================
// Handler Errors (command and event bodies)
// ============================================================================

/// Errors that can escape a plugin command or event handler.
///
/// The dispatcher does not catch these; they reach the host event loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("send error: {0}")]
    Send(#[from] mpsc::error::SendError<Outbound>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage_error",
            Self::Plugin(_) => "plugin_error",
            Self::Send(_) => "send_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Storage faults abort the event loop; everything else is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type for command and event handlers.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_codes() {
        assert_eq!(HandlerError::Internal("x".into()).error_code(), "internal_error");
        let plugin = HandlerError::from(PluginError::NotFound("nope".into()));
        assert_eq!(plugin.error_code(), "plugin_error");
        assert!(!plugin.is_fatal());
    }

    #[test]
    fn storage_errors_are_fatal() {
        let err = HandlerError::from(StorageError::Integrity("bad page".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn cleanup_error_lists_failures() {
        let err = PluginError::Cleanup {
            plugin: "plugins.greet".into(),
            failures: vec!["a broke".into(), "b broke".into()],
        };
        assert_eq!(
            err.to_string(),
            "unload of plugins.greet finished with errors: a broke; b broke"
        );
    }
}
