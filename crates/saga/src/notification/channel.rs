//! Delivery channels.
//!
//! The set of channels is closed: `DeliveryChannels` owns one simulated
//! sender per `ChannelType` and dispatches with a `match`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::UserId;
use domain::ChannelType;

use crate::error::{Result, SagaError};

/// A composed message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Simulated sender for one channel.
#[derive(Debug, Default)]
pub struct SimulatedSender {
    latency: Duration,
    failing: AtomicBool,
    delivered: AtomicUsize,
}

impl SimulatedSender {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Makes every subsequent delivery fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages delivered so far.
    pub fn sent_count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    async fn send(&self, channel: ChannelType, message: &OutboundMessage) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SagaError::System(format!(
                "{channel} delivery to {} rejected",
                message.recipient
            )));
        }
        tracing::info!(
            channel = %channel,
            recipient = %message.recipient,
            subject = %message.subject,
            "notification delivered"
        );
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One sender per channel type.
#[derive(Debug, Default)]
pub struct DeliveryChannels {
    pub email: SimulatedSender,
    pub sms: SimulatedSender,
}

impl DeliveryChannels {
    pub async fn deliver(&self, channel: ChannelType, message: &OutboundMessage) -> Result<()> {
        match channel {
            ChannelType::Email => self.email.send(channel, message).await,
            ChannelType::Sms => self.sms.send(channel, message).await,
        }
    }

    /// Address of a user on the given channel.
    pub fn recipient(channel: ChannelType, user_id: UserId) -> String {
        match channel {
            ChannelType::Email => format!("user{user_id}@example.com"),
            ChannelType::Sms => format!("+1555{:07}", user_id.as_i64()),
        }
    }
}
