//! Notification participant.

mod channel;
mod model;
mod participant;
mod store;

pub use channel::{DeliveryChannels, OutboundMessage, SimulatedSender};
pub use model::{NewNotification, Notification, NotificationKind, NotificationStatus};
pub use participant::NotificationParticipant;
pub use store::{InMemoryNotificationStore, NotificationStore};
