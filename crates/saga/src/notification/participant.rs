//! Notification participant: tells customers about their orders.

use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{
    ChannelType, DomainEvent, EventHeader, InvoiceGeneratedData, NotificationSentData,
    OrderCreatedData, SagaEvent,
};
use event_bus::{EventEnvelope, EventHandler, HandlerError};

use super::channel::{DeliveryChannels, OutboundMessage};
use super::model::{NewNotification, Notification, NotificationKind, NotificationStatus};
use super::store::NotificationStore;
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Sends one message per triggering event. A failed delivery is recorded
/// and never fed back into the saga.
pub struct NotificationParticipant<S: NotificationStore> {
    store: S,
    channels: DeliveryChannels,
    publisher: EventPublisher,
    channel: ChannelType,
    channel_timeout: Duration,
}

impl<S: NotificationStore> NotificationParticipant<S> {
    pub fn new(
        store: S,
        channels: DeliveryChannels,
        publisher: EventPublisher,
        channel: ChannelType,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channels,
            publisher,
            channel,
            channel_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn channels(&self) -> &DeliveryChannels {
        &self.channels
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_order_created(&self, event: &OrderCreatedData) -> Result<()> {
        let header = event.header;
        let message = OutboundMessage {
            recipient: DeliveryChannels::recipient(self.channel, header.user_id),
            subject: "Order Confirmation".to_string(),
            body: format!(
                "Your order #{} has been received. Total: {}.",
                header.order_id, event.total_amount
            ),
        };
        self.notify(&header, NotificationKind::OrderConfirmation, message)
            .await
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_invoice_generated(&self, event: &InvoiceGeneratedData) -> Result<()> {
        let header = event.header;
        let message = OutboundMessage {
            recipient: DeliveryChannels::recipient(self.channel, header.user_id),
            subject: format!("Invoice Ready - {}", event.invoice_number),
            body: format!(
                "Invoice {} for order #{} is ready. Total due: {}.",
                event.invoice_number, header.order_id, event.total_amount
            ),
        };
        self.notify(&header, NotificationKind::InvoiceReady, message)
            .await
    }

    pub async fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.store.list_by_user(user_id).await
    }

    pub async fn notifications_for_order(&self, order_id: OrderId) -> Result<Vec<Notification>> {
        self.store.list_by_order(order_id).await
    }

    async fn notify(
        &self,
        header: &EventHeader,
        kind: NotificationKind,
        message: OutboundMessage,
    ) -> Result<()> {
        if let Some(sent) = self.store.find_sent(header.order_id, kind).await? {
            if sent.published {
                tracing::warn!(order_id = %header.order_id, ?kind, "notification already sent, skipping");
                return Ok(());
            }
            tracing::warn!(order_id = %header.order_id, ?kind, "notification sent but never announced, re-emitting");
            return self.announce(&sent).await;
        }

        let delivery =
            tokio::time::timeout(self.channel_timeout, self.channels.deliver(self.channel, &message))
                .await;
        let failure_reason = match delivery {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "{} delivery timed out after {}ms",
                self.channel,
                self.channel_timeout.as_millis()
            )),
        };
        let status = if failure_reason.is_none() {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        };

        let notification = self
            .store
            .insert(NewNotification {
                user_id: header.user_id,
                order_id: header.order_id,
                kind,
                channel: self.channel,
                recipient: message.recipient,
                subject: message.subject,
                message: message.body,
                status,
                failure_reason,
            })
            .await?;

        let status_label = match status {
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        };
        metrics::counter!("notifications_total", "status" => status_label).increment(1);

        if status == NotificationStatus::Failed {
            tracing::warn!(
                order_id = %header.order_id,
                ?kind,
                reason = notification.failure_reason.as_deref().unwrap_or_default(),
                "notification delivery failed"
            );
            return Ok(());
        }

        self.announce(&notification).await
    }

    async fn announce(&self, notification: &Notification) -> Result<()> {
        self.publisher
            .publish(&SagaEvent::NotificationSent(NotificationSentData {
                header: EventHeader::now(notification.order_id, notification.user_id),
                notification_type: notification.channel,
                recipient: notification.recipient.clone(),
            }))
            .await?;
        self.store.mark_published(notification.id).await
    }
}

#[async_trait]
impl<S: NotificationStore + 'static> EventHandler for NotificationParticipant<S> {
    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match SagaEvent::from_envelope(envelope).map_err(SagaError::from)? {
            SagaEvent::OrderCreated(event) => self.on_order_created(&event).await?,
            SagaEvent::InvoiceGenerated(event) => self.on_invoice_generated(&event).await?,
            other => {
                return Err(SagaError::Validation(format!(
                    "notification participant does not consume {}",
                    other.event_type()
                ))
                .into());
            }
        }
        Ok(())
    }
}
