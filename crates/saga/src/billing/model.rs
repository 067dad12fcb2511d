//! Invoice records.

use chrono::{DateTime, Utc};
use common::{InvoiceId, Money, OrderId, PaymentId, UserId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_id: PaymentId,
    pub invoice_number: String,
    pub amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Set once `InvoiceGenerated` reached the bus.
    #[serde(skip)]
    pub published: bool,
}

/// Invoice fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_id: PaymentId,
    pub invoice_number: String,
    pub amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}
