//! Invoice persistence.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{InvoiceId, OrderId, UserId};
use tokio::sync::RwLock;

use super::model::{Invoice, NewInvoice};
use crate::error::{Result, SagaError};

/// Result of an invoice insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceInsert {
    Inserted(Invoice),
    /// The order already has an invoice; nothing was written.
    OrderExists,
    /// Another invoice uses the number; nothing was written.
    NumberTaken,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Inserts the invoice if neither its order nor its number is taken.
    async fn insert(&self, invoice: NewInvoice) -> Result<InvoiceInsert>;

    async fn find(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>>;

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Invoice>>;

    /// Records that the order's invoice was announced.
    async fn mark_published(&self, order_id: OrderId) -> Result<()>;

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Invoice>>;
}

#[derive(Debug, Default)]
struct InvoiceState {
    by_order: BTreeMap<OrderId, Invoice>,
    numbers: HashSet<String>,
    next_id: i64,
}

/// In-memory invoice store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceStore {
    state: Arc<RwLock<InvoiceState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryInvoiceStore {
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
impl InvoiceStore for InMemoryInvoiceStore {
    async fn insert(&self, invoice: NewInvoice) -> Result<InvoiceInsert> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("invoice store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        if state.by_order.contains_key(&invoice.order_id) {
            return Ok(InvoiceInsert::OrderExists);
        }
        if state.numbers.contains(&invoice.invoice_number) {
            return Ok(InvoiceInsert::NumberTaken);
        }

        state.next_id += 1;
        let stored = Invoice {
            id: InvoiceId::new(state.next_id),
            order_id: invoice.order_id,
            user_id: invoice.user_id,
            payment_id: invoice.payment_id,
            invoice_number: invoice.invoice_number,
            amount: invoice.amount,
            tax_amount: invoice.tax_amount,
            total_amount: invoice.total_amount,
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            published: false,
        };
        state.numbers.insert(stored.invoice_number.clone());
        state.by_order.insert(stored.order_id, stored.clone());
        Ok(InvoiceInsert::Inserted(stored))
    }

    async fn find(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>> {
        let state = self.state.read().await;
        Ok(state.by_order.values().find(|i| i.id == invoice_id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Invoice>> {
        Ok(self.state.read().await.by_order.get(&order_id).cloned())
    }

    async fn mark_published(&self, order_id: OrderId) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("invoice store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        let invoice = state
            .by_order
            .get_mut(&order_id)
            .ok_or_else(|| SagaError::not_found("Invoice", order_id))?;
        invoice.published = true;
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }
}
