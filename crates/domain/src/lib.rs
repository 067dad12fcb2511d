//! Event contracts for the order fulfillment saga.
//!
//! This crate defines what travels between participants:
//! - one topic per event type, keyed by order id
//! - the `SagaEvent` payloads, each carrying a denormalized snapshot of what
//!   downstream participants need (never references into another store)
//! - failure codes for the compensating events
//! - conversion to and from bus envelopes, with payload validation

pub mod codes;
pub mod error;
pub mod event;
pub mod events;
pub mod items;
pub mod topics;

pub use codes::{ChannelType, InventoryFailureCode, OrderFailureCode, PaymentFailureCode};
pub use error::DomainError;
pub use event::DomainEvent;
pub use events::{
    EventHeader, InventoryFailedData, InventoryReservedData, InvoiceGeneratedData,
    NotificationSentData, OrderCancelledData, OrderConfirmedData, OrderCreatedData,
    OrderFailedData, PaymentCompletedData, PaymentFailedData, SagaEvent,
};
pub use items::{LineItem, ReservedItem, order_total};
