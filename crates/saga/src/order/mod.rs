//! Order participant.

mod model;
mod participant;
mod store;

pub use model::{Order, OrderStatus, OutboxEntry};
pub use participant::OrderParticipant;
pub use store::{InMemoryOrderStore, OrderStore};
