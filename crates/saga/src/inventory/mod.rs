//! Inventory participant.

mod model;
mod participant;
mod store;

pub use model::{NewProduct, Product, Reservation, ReservationStatus};
pub use participant::InventoryParticipant;
pub use store::{InMemoryInventoryStore, InventoryStore};
