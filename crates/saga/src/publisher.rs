//! Publishing saga events onto the bus.

use std::sync::Arc;

use domain::{DomainEvent, SagaEvent};
use event_bus::{EventBus, Offset, RetryPolicy};

use crate::error::Result;

/// Handle through which a participant emits its events.
///
/// Each participant gets its own publisher at construction; the topic and
/// key are derived from the event, so callers cannot route an event wrongly.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    retry: RetryPolicy,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, retry: RetryPolicy) -> Self {
        Self { bus, retry }
    }

    /// Publishes the event, retrying transient bus failures with backoff.
    pub async fn publish(&self, event: &SagaEvent) -> Result<Offset> {
        let envelope = event.to_envelope()?;
        let topic = event.topic();
        let key = event.key();

        let mut attempt = 1;
        loop {
            match self.bus.publish(topic, &key, envelope.clone()).await {
                Ok(offset) => {
                    tracing::debug!(
                        topic,
                        key = %key,
                        event_type = event.event_type(),
                        partition = offset.partition,
                        offset = offset.offset,
                        "event published"
                    );
                    return Ok(offset);
                }
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        topic,
                        key = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::{OrderId, PaymentId, UserId};
    use domain::{EventHeader, OrderConfirmedData};
    use event_bus::{BusError, InMemoryEventBus};

    use super::testing::FlakyBus;
    use super::*;
    use crate::error::SagaError;

    fn confirmed() -> SagaEvent {
        SagaEvent::OrderConfirmed(OrderConfirmedData {
            header: EventHeader::now(OrderId::new(5), UserId::new(1)),
            payment_id: PaymentId::new(3),
        })
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2,
        }
    }

    #[tokio::test]
    async fn publishes_on_topic_with_order_key() {
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(Arc::new(bus.clone()), RetryPolicy::default());

        publisher.publish(&confirmed()).await.unwrap();

        let events = bus.events(domain::topics::ORDER_CONFIRMED).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "5");
        assert_eq!(events[0].event_type, "OrderConfirmed");
    }

    #[tokio::test]
    async fn transient_publish_failures_are_retried() {
        let inner = InMemoryEventBus::new();
        let bus = FlakyBus::new(inner.clone(), 2);
        let publisher = EventPublisher::new(Arc::new(bus), fast_retry(3));

        publisher.publish(&confirmed()).await.unwrap();
        assert_eq!(inner.event_count(domain::topics::ORDER_CONFIRMED).await, 1);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let inner = InMemoryEventBus::new();
        let bus = FlakyBus::new(inner.clone(), 10);
        let publisher = EventPublisher::new(Arc::new(bus), fast_retry(2));

        let err = publisher.publish(&confirmed()).await.unwrap_err();
        assert!(matches!(err, SagaError::Bus(BusError::Unavailable(_))));
        assert_eq!(inner.event_count(domain::topics::ORDER_CONFIRMED).await, 0);
    }
}
