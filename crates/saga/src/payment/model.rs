//! Payment records.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use domain::PaymentFailureCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

/// The single payment attempt made for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<PaymentFailureCode>,
    pub created_at: DateTime<Utc>,
    /// Set once the outcome event reached the bus.
    #[serde(skip)]
    pub published: bool,
}

/// Payment fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<PaymentFailureCode>,
}
