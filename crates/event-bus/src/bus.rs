use std::sync::Arc;

use async_trait::async_trait;

use crate::{EventEnvelope, HandlerError, Result};

/// Position of an event inside a topic partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    pub partition: usize,
    pub offset: u64,
}

/// Consumer callback invoked for every delivered event.
///
/// Delivery is at-least-once: the same event may arrive more than once, so
/// implementations must be idempotent. Returning an error leaves the event
/// unacknowledged.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes one event.
    async fn handle(&self, event: &EventEnvelope) -> std::result::Result<(), HandlerError>;
}

/// Core trait for event bus implementations.
///
/// All implementations must be thread-safe (Send + Sync) so a single handle
/// can be shared by every worker of a participant.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Appends an event to the topic log.
    ///
    /// Events published with the same key land in the same partition and are
    /// delivered to each consumer group in publication order.
    async fn publish(&self, topic: &str, key: &str, event: EventEnvelope) -> Result<Offset>;

    /// Registers the handler of a consumer group for a topic.
    ///
    /// Delivery starts from the earliest retained event. A group may only
    /// register one handler per topic.
    async fn subscribe(
        &self,
        topic: &str,
        group_id: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()>;
}
