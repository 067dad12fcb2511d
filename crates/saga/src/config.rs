//! Runtime settings shared by the saga participants.

use std::time::Duration;

use domain::ChannelType;
use event_bus::RetryPolicy;

use crate::payment::ApprovalRule;

/// Settings for building a [`SagaRuntime`](crate::SagaRuntime).
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Partitions per topic on the bus.
    pub partitions: usize,
    /// Redelivery policy for failed handlers, also used by publishers.
    pub retry: RetryPolicy,
    /// Invoice tax in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
    /// Days between invoice issue and due date.
    pub invoice_term_days: i64,
    /// Upper bound for one payment gateway call.
    pub gateway_timeout: Duration,
    /// Upper bound for one notification delivery.
    pub channel_timeout: Duration,
    /// Decision rule of the simulated payment gateway.
    pub approval_rule: ApprovalRule,
    /// Channel used for customer notifications.
    pub notification_channel: ChannelType,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            retry: RetryPolicy::default(),
            tax_rate_bps: 1000,
            invoice_term_days: 30,
            gateway_timeout: Duration::from_secs(2),
            channel_timeout: Duration::from_secs(1),
            approval_rule: ApprovalRule::AlwaysApprove,
            notification_channel: ChannelType::Email,
        }
    }
}
