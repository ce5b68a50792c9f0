//! Error types for the updateflow crate.
//!
//! Lookup misses are never errors (they return `Option`), and disposal never
//! returns one; what remains are handler failures, reply transport failures
//! and configuration problems.

use thiserror::Error;

/// The main error type for updateflow operations.
#[derive(Debug, Error)]
pub enum UpdateflowError {
    /// A handler in the chain failed.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// The configuration was rejected.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The update context was cancelled before the operation completed.
    #[error("Update processing cancelled: {0}")]
    Cancelled(String),

    /// The update carries no conversation to reply to.
    #[error("Update {update_id} has no conversation")]
    NoConversation {
        /// The update id.
        update_id: i64,
    },

    /// The outbound bot client failed.
    #[error("Bot client error: {0}")]
    Client(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UpdateflowError {
    /// Creates a cancelled error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Creates a bot client error.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Returns true if this error reports a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
            || matches!(self, Self::Handler(HandlerError::Cancelled { .. }))
    }
}

/// Errors raised by update handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler failed with a message.
    #[error("Handler '{handler}' failed: {message}")]
    Failed {
        /// The handler name.
        handler: String,
        /// The failure message.
        message: String,
    },

    /// The handler observed cancellation and gave up.
    #[error("Handler '{handler}' cancelled: {reason}")]
    Cancelled {
        /// The handler name.
        handler: String,
        /// The cancellation reason.
        reason: String,
    },

    /// Any other error bubbled up from handler code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Creates a handler failure.
    #[must_use]
    pub fn failed(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Creates a handler cancellation.
    #[must_use]
    pub fn cancelled(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("Invalid config field '{field}': {message}")]
    InvalidField {
        /// The field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// An environment variable could not be parsed.
    #[error("Invalid environment variable {name}={value}")]
    InvalidEnv {
        /// The variable name.
        name: String,
        /// The raw value.
        value: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result alias for updateflow operations.
pub type Result<T, E = UpdateflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::failed("echo", "boom");
        assert_eq!(err.to_string(), "Handler 'echo' failed: boom");
    }

    #[test]
    fn test_handler_error_converts() {
        let err: UpdateflowError = HandlerError::cancelled("echo", "evicted").into();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Handler 'echo' cancelled: evicted");
    }

    #[test]
    fn test_anyhow_into_handler_error() {
        let err: HandlerError = anyhow::anyhow!("socket closed").into();
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn test_no_conversation_display() {
        let err = UpdateflowError::NoConversation { update_id: 7 };
        assert_eq!(err.to_string(), "Update 7 has no conversation");
        assert!(!err.is_cancelled());
    }
}
