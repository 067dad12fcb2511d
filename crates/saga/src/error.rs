//! Saga error types.

use common::{OrderId, ProductId};
use domain::DomainError;
use event_bus::{BusError, HandlerError};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur in saga participants.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The referenced entity does not exist in the participant's store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed payload or bad request.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The order is not in a state that allows the requested action.
    #[error("Order {order_id} cannot be {action} while {status}")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// Not enough free stock for a reservation.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The payment gateway declined the charge.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The payment gateway failed or could not be reached.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Infrastructure failure (storage, channel, timeouts).
    #[error("System error: {0}")]
    System(String),

    /// Event bus error.
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SagaError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SagaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SagaError::System(_) | SagaError::Bus(_))
    }
}

impl From<SagaError> for HandlerError {
    fn from(err: SagaError) -> Self {
        if err.is_transient() {
            HandlerError::Transient(err.to_string())
        } else {
            HandlerError::Permanent(err.to_string())
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
