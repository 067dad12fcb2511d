//! Order persistence with a transactional outbox.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use domain::SagaEvent;
use tokio::sync::RwLock;

use super::model::{Order, OrderStatus, OutboxEntry};
use crate::error::{Result, SagaError};

/// Storage for orders and their pending outbound events.
///
/// Every mutation takes the event describing it; the store keeps both
/// together so a crash can never persist one without the other.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserves the next order id.
    async fn next_id(&self) -> Result<OrderId>;

    /// Inserts a new order and its outbox event.
    async fn insert(&self, order: Order, event: SagaEvent) -> Result<Order>;

    /// Moves an order to `to` if its current status is one of `from`, and
    /// queues `event` in the same step.
    ///
    /// Fails with `InvalidTransition` when the current status is not allowed.
    async fn transition(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        failure_reason: Option<String>,
        event: SagaEvent,
    ) -> Result<Order>;

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Pending outbox entries in write order.
    async fn pending_outbox(&self) -> Result<Vec<OutboxEntry>>;

    /// Drops an outbox entry once the bus has accepted it.
    async fn remove_outbox(&self, sequence: u64) -> Result<()>;
}

#[derive(Debug, Default)]
struct OrderState {
    orders: BTreeMap<OrderId, Order>,
    outbox: BTreeMap<u64, SagaEvent>,
    next_order_id: i64,
    next_sequence: u64,
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a system error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of events still waiting in the outbox.
    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("order store unavailable".to_string()));
        }
        Ok(())
    }
}

impl OrderState {
    fn enqueue(&mut self, event: SagaEvent) {
        self.next_sequence += 1;
        self.outbox.insert(self.next_sequence, event);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn next_id(&self) -> Result<OrderId> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.next_order_id += 1;
        Ok(OrderId::new(state.next_order_id))
    }

    async fn insert(&self, order: Order, event: SagaEvent) -> Result<Order> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(SagaError::Conflict(format!("order {} already exists", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        state.enqueue(event);
        Ok(order)
    }

    async fn transition(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        failure_reason: Option<String>,
        event: SagaEvent,
    ) -> Result<Order> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| SagaError::not_found("Order", order_id))?;

        if !from.contains(&order.status) {
            return Err(SagaError::InvalidTransition {
                order_id,
                status: order.status,
                action: match to {
                    OrderStatus::Confirmed => "confirmed",
                    OrderStatus::Failed => "failed",
                    OrderStatus::Cancelled => "cancelled",
                    OrderStatus::Processing => "processed",
                    OrderStatus::Completed => "completed",
                    OrderStatus::Pending => "reopened",
                },
            });
        }

        order.status = to;
        order.failure_reason = failure_reason;
        order.updated_at = Utc::now();
        let updated = order.clone();
        state.enqueue(event);
        Ok(updated)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn pending_outbox(&self) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .map(|(sequence, event)| OutboxEntry {
                sequence: *sequence,
                event: event.clone(),
            })
            .collect())
    }

    async fn remove_outbox(&self, sequence: u64) -> Result<()> {
        self.state.write().await.outbox.remove(&sequence);
        Ok(())
    }
}
