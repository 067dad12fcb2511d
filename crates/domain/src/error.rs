//! Domain error types.

use thiserror::Error;

/// Errors raised while encoding or decoding saga events.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The envelope names an event type this system does not know.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload decoded but violates the event contract.
    #[error("Invalid {event_type} payload: {reason}")]
    Validation {
        event_type: &'static str,
        reason: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub(crate) fn validation(event_type: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            event_type,
            reason: reason.into(),
        }
    }
}
