//! Shared value types used across every saga participant.
//!
//! Identifiers are plain integers on the wire (they mirror database identity
//! columns) but are wrapped in distinct newtypes so an order id can never be
//! passed where a product id is expected.

pub mod ids;
pub mod money;

pub use ids::{InvoiceId, NotificationId, OrderId, PaymentId, ProductId, UserId};
pub use money::Money;
