use thiserror::Error;

/// Errors that can occur when interacting with the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus has been shut down and accepts no more work.
    #[error("Event bus is closed")]
    Closed,

    /// The consumer group already has a handler for this topic.
    #[error("Consumer group {group} is already subscribed to topic {topic}")]
    AlreadySubscribed { topic: String, group: String },

    /// The broker could not accept the request right now; retrying may succeed.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    /// Returns true if the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, BusError::Unavailable(_))
    }
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Failure reported by an event handler.
///
/// The classification decides what the bus does with the event: transient
/// failures are redelivered with backoff, permanent ones go straight to the
/// dead-letter list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Infrastructure failure (storage, publish); redelivery may succeed.
    #[error("transient handler failure: {0}")]
    Transient(String),

    /// The event cannot ever be processed (missing entity, malformed payload).
    #[error("permanent handler failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    /// Returns true if the event should be redelivered.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }

    /// Returns the failure description.
    pub fn message(&self) -> &str {
        match self {
            HandlerError::Transient(msg) | HandlerError::Permanent(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(BusError::Unavailable("broker down".into()).is_transient());
        assert!(!BusError::Closed.is_transient());
        assert!(
            !BusError::AlreadySubscribed {
                topic: "t".into(),
                group: "g".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn handler_error_classification() {
        assert!(HandlerError::Transient("db".into()).is_retryable());
        assert!(!HandlerError::Permanent("bad payload".into()).is_retryable());
        assert_eq!(HandlerError::Permanent("bad payload".into()).message(), "bad payload");
    }
}
