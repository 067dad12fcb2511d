//! Order fulfillment saga, coordinated by choreography.
//!
//! There is no coordinator. Five participants each own one piece of state
//! and react to the events of the others:
//!
//! ```text
//! Order ──OrderCreated──▶ Inventory ──InventoryReserved──▶ Payment
//!   ▲                         │                              │
//!   │◀──────InventoryFailed───┘                              │
//!   │◀──────────────PaymentCompleted / PaymentFailed─────────┤
//!                                                            ▼
//! Notification ◀──InvoiceGenerated── Billing ◀──PaymentCompleted
//! ```
//!
//! Delivery is at-least-once, so every handler is idempotent. Business
//! failures (no stock, declined payment) travel as compensating events;
//! infrastructure failures are retried by the bus and end up in its
//! dead-letter list.

pub mod billing;
pub mod config;
pub mod error;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod payment;
pub mod publisher;
pub mod runtime;

pub use config::SagaConfig;
pub use error::{Result, SagaError};
pub use publisher::EventPublisher;
pub use runtime::SagaRuntime;
