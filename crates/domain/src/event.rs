//! Routing contract shared by every saga event.

use common::OrderId;
use serde::{Serialize, de::DeserializeOwned};

/// A fact published by one participant for the others.
///
/// Every event concerns exactly one order, and the order id doubles as the
/// partition key so that all events of an order stay in sequence.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Contract name carried in the envelope, e.g. `InventoryReserved`.
    fn event_type(&self) -> &'static str;

    fn topic(&self) -> &'static str;

    fn order_id(&self) -> OrderId;

    fn key(&self) -> String {
        self.order_id().to_string()
    }
}
