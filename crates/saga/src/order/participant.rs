//! Order participant: owns the order lifecycle.

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use domain::{
    DomainEvent, EventHeader, InventoryFailedData, LineItem, OrderCancelledData,
    OrderConfirmedData, OrderCreatedData, OrderFailedData, OrderFailureCode, PaymentCompletedData,
    PaymentFailedData, SagaEvent, order_total,
};
use event_bus::{EventEnvelope, EventHandler, HandlerError};
use tokio::sync::Mutex;

use super::model::{Order, OrderStatus};
use super::store::OrderStore;
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Statuses from which a saga outcome may still finalize an order.
const OPEN: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Processing];

/// Creates orders and finalizes them from payment and inventory outcomes.
///
/// Every status change is written together with the event announcing it,
/// then the outbox is relayed to the bus.
pub struct OrderParticipant<S: OrderStore> {
    store: S,
    publisher: EventPublisher,
    relay_lock: Mutex<()>,
}

impl<S: OrderStore> OrderParticipant<S> {
    pub fn new(store: S, publisher: EventPublisher) -> Self {
        Self {
            store,
            publisher,
            relay_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and persists a new order, then announces it.
    ///
    /// The order is stored even if the announcement cannot be published
    /// right away; the outbox entry is relayed later.
    #[tracing::instrument(skip(self, items), fields(user_id = %user_id, item_count = items.len()))]
    pub async fn create_order(&self, user_id: UserId, items: Vec<LineItem>) -> Result<Order> {
        if items.is_empty() {
            return Err(SagaError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(SagaError::Validation(format!(
                    "quantity for product {} must be positive",
                    item.product_id
                )));
            }
            if item.unit_price.is_negative() {
                return Err(SagaError::Validation(format!(
                    "unit price for product {} must not be negative",
                    item.product_id
                )));
            }
        }

        let total_amount = order_total(&items)
            .ok_or_else(|| SagaError::Validation("order total overflows".to_string()))?;
        let order_id = self.store.next_id().await?;
        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id,
            status: OrderStatus::Pending,
            items: items.clone(),
            total_amount,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        let event = SagaEvent::OrderCreated(OrderCreatedData {
            header: EventHeader::now(order_id, user_id),
            items,
            total_amount,
        });

        let order = self.store.insert(order, event).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");

        if let Err(e) = self.relay_outbox().await {
            tracing::warn!(order_id = %order.id, error = %e, "order stored, announcement deferred to outbox relay");
        }
        Ok(order)
    }

    /// Cancels a pending order and announces the cancellation.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(&self, order_id: OrderId, reason: Option<String>) -> Result<Order> {
        let order = self.require(order_id).await?;
        let reason = reason.unwrap_or_else(|| "Cancelled by customer".to_string());
        let event = SagaEvent::OrderCancelled(OrderCancelledData {
            header: EventHeader::now(order_id, order.user_id),
            reason: reason.clone(),
        });

        let order = self
            .store
            .transition(
                order_id,
                &[OrderStatus::Pending],
                OrderStatus::Cancelled,
                Some(reason),
                event,
            )
            .await?;
        tracing::info!(order_id = %order_id, "order cancelled");

        if let Err(e) = self.relay_outbox().await {
            tracing::warn!(order_id = %order_id, error = %e, "cancellation deferred to outbox relay");
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_payment_completed(&self, event: &PaymentCompletedData) -> Result<()> {
        let header = &event.header;
        let confirmed = SagaEvent::OrderConfirmed(OrderConfirmedData {
            header: EventHeader::now(header.order_id, header.user_id),
            payment_id: event.payment_id,
        });
        self.finalize(header.order_id, OrderStatus::Confirmed, None, confirmed)
            .await
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_payment_failed(&self, event: &PaymentFailedData) -> Result<()> {
        let header = &event.header;
        let reason = format!("Payment failed: {}", event.reason);
        let failed = SagaEvent::OrderFailed(OrderFailedData {
            header: EventHeader::now(header.order_id, header.user_id),
            reason: reason.clone(),
            failure_code: OrderFailureCode::PaymentFailed,
        });
        self.finalize(header.order_id, OrderStatus::Failed, Some(reason), failed)
            .await
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_inventory_failed(&self, event: &InventoryFailedData) -> Result<()> {
        let header = &event.header;
        let reason = format!("Inventory unavailable: {}", event.reason);
        let failed = SagaEvent::OrderFailed(OrderFailedData {
            header: EventHeader::now(header.order_id, header.user_id),
            reason: reason.clone(),
            failure_code: OrderFailureCode::InventoryUnavailable,
        });
        self.finalize(header.order_id, OrderStatus::Failed, Some(reason), failed)
            .await
    }

    /// Publishes every pending outbox entry in write order.
    ///
    /// Stops at the first failure so later entries never overtake earlier
    /// ones. Returns how many entries were relayed.
    pub async fn relay_outbox(&self) -> Result<usize> {
        let _guard = self.relay_lock.lock().await;
        let mut relayed = 0;
        for entry in self.store.pending_outbox().await? {
            self.publisher.publish(&entry.event).await?;
            self.store.remove_outbox(entry.sequence).await?;
            relayed += 1;
        }
        if relayed > 0 {
            tracing::debug!(relayed, "outbox relayed");
        }
        Ok(relayed)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.store.get(order_id).await
    }

    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.store.list_by_user(user_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<Order>> {
        self.store.list_all().await
    }

    async fn require(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Order", order_id))
    }

    async fn finalize(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        failure_reason: Option<String>,
        event: SagaEvent,
    ) -> Result<()> {
        let order = self.require(order_id).await?;
        if order.status == to {
            tracing::debug!(order_id = %order_id, status = %to, "order already finalized, skipping");
            self.relay_outbox().await?;
            return Ok(());
        }

        match self
            .store
            .transition(order_id, &OPEN, to, failure_reason, event)
            .await
        {
            Ok(order) => {
                tracing::info!(order_id = %order_id, status = %order.status, "order status updated");
            }
            Err(SagaError::InvalidTransition { status, .. }) => {
                tracing::warn!(
                    order_id = %order_id,
                    status = %status,
                    target = %to,
                    "ignoring outcome for order that is no longer open"
                );
            }
            Err(e) => return Err(e),
        }

        self.relay_outbox().await?;
        Ok(())
    }
}

#[async_trait]
impl<S: OrderStore + 'static> EventHandler for OrderParticipant<S> {
    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match SagaEvent::from_envelope(envelope).map_err(SagaError::from)? {
            SagaEvent::PaymentCompleted(event) => self.on_payment_completed(&event).await?,
            SagaEvent::PaymentFailed(event) => self.on_payment_failed(&event).await?,
            SagaEvent::InventoryFailed(event) => self.on_inventory_failed(&event).await?,
            other => {
                return Err(SagaError::Validation(format!(
                    "order participant does not consume {}",
                    other.event_type()
                ))
                .into());
            }
        }
        Ok(())
    }
}
