//! Payment participant.

mod gateway;
mod model;
mod participant;
mod store;

pub use gateway::{ApprovalRule, ChargeRequest, GatewayOutcome, PaymentGateway, SimulatedGateway};
pub use model::{NewPayment, Payment, PaymentStatus};
pub use participant::PaymentParticipant;
pub use store::{InMemoryPaymentStore, PaymentStore};
