//! Notification records.

use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, UserId};
use domain::ChannelType;
use serde::Serialize;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderConfirmation,
    InvoiceReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub channel: ChannelType,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub sent_at: DateTime<Utc>,
    /// Set once `NotificationSent` reached the bus.
    #[serde(skip)]
    pub published: bool,
}

/// Notification fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub channel: ChannelType,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub status: NotificationStatus,
    pub failure_reason: Option<String>,
}
