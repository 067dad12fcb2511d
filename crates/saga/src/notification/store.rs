//! Notification persistence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{NotificationId, OrderId, UserId};
use tokio::sync::RwLock;

use super::model::{NewNotification, Notification, NotificationKind, NotificationStatus};
use crate::error::{Result, SagaError};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: NewNotification) -> Result<Notification>;

    /// The delivered notification of this kind for the order, if any.
    async fn find_sent(
        &self,
        order_id: OrderId,
        kind: NotificationKind,
    ) -> Result<Option<Notification>>;

    async fn mark_published(&self, id: NotificationId) -> Result<()>;

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Notification>>;

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<Notification>>;
}

#[derive(Debug, Default)]
struct NotificationState {
    notifications: Vec<Notification>,
    next_id: i64,
}

/// In-memory notification store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationStore {
    state: Arc<RwLock<NotificationState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a system error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("notification store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        state.next_id += 1;
        let stored = Notification {
            id: NotificationId::new(state.next_id),
            user_id: notification.user_id,
            order_id: notification.order_id,
            kind: notification.kind,
            channel: notification.channel,
            recipient: notification.recipient,
            subject: notification.subject,
            message: notification.message,
            status: notification.status,
            failure_reason: notification.failure_reason,
            sent_at: Utc::now(),
            published: false,
        };
        state.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn find_sent(
        &self,
        order_id: OrderId,
        kind: NotificationKind,
    ) -> Result<Option<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .find(|n| {
                n.order_id == order_id && n.kind == kind && n.status == NotificationStatus::Sent
            })
            .cloned())
    }

    async fn mark_published(&self, id: NotificationId) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("notification store unavailable".to_string()));
        }
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SagaError::not_found("Notification", id))?;
        notification.published = true;
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.order_id == order_id)
            .cloned()
            .collect())
    }
}
