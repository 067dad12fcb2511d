//! Payment persistence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId, UserId};
use tokio::sync::RwLock;

use super::model::{NewPayment, Payment};
use crate::error::{Result, SagaError};

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts the payment unless the order already has one.
    ///
    /// Returns `None` when a payment for the order exists; the check and the
    /// insert happen atomically.
    async fn insert_if_absent(&self, payment: NewPayment) -> Result<Option<Payment>>;

    async fn find(&self, payment_id: PaymentId) -> Result<Option<Payment>>;

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Records that the order's payment outcome was published.
    async fn mark_published(&self, order_id: OrderId) -> Result<()>;

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>>;
}

#[derive(Debug, Default)]
struct PaymentState {
    by_order: BTreeMap<OrderId, Payment>,
    next_id: i64,
}

/// In-memory payment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<PaymentState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a system error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.by_order.len()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_if_absent(&self, payment: NewPayment) -> Result<Option<Payment>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("payment store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        if state.by_order.contains_key(&payment.order_id) {
            return Ok(None);
        }

        state.next_id += 1;
        let stored = Payment {
            id: PaymentId::new(state.next_id),
            order_id: payment.order_id,
            user_id: payment.user_id,
            amount: payment.amount,
            status: payment.status,
            transaction_id: payment.transaction_id,
            failure_reason: payment.failure_reason,
            failure_code: payment.failure_code,
            created_at: Utc::now(),
            published: false,
        };
        state.by_order.insert(stored.order_id, stored.clone());
        Ok(Some(stored))
    }

    async fn find(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.by_order.values().find(|p| p.id == payment_id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.by_order.get(&order_id).cloned())
    }

    async fn mark_published(&self, order_id: OrderId) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("payment store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        let payment = state
            .by_order
            .get_mut(&order_id)
            .ok_or_else(|| SagaError::not_found("Payment", order_id))?;
        payment.published = true;
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}
