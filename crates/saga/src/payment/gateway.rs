//! Payment gateway capability and its simulated implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SagaError};

/// A charge sent to the gateway.
///
/// The gateway answers a repeated `idempotency_key` with the outcome of the
/// first charge instead of charging again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub idempotency_key: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
}

impl ChargeRequest {
    /// A charge keyed by the order, so an order is charged at most once.
    pub fn for_order(order_id: OrderId, user_id: UserId, amount: Money) -> Self {
        Self {
            idempotency_key: format!("order-{order_id}"),
            order_id,
            user_id,
            amount,
        }
    }
}

/// Answer of a gateway that was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

/// External payment processor.
///
/// `Err` means the gateway could not give an answer at all.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayOutcome>;
}

/// Decision rule of [`SimulatedGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalRule {
    AlwaysApprove,
    AlwaysDecline,
    /// Declines charges strictly above the amount.
    DeclineAbove(Money),
    /// Every call fails as if the gateway were down.
    Unavailable,
}

/// Gateway stand-in with configurable latency and approval rule.
#[derive(Debug)]
pub struct SimulatedGateway {
    rule: RwLock<ApprovalRule>,
    latency: RwLock<Duration>,
    answered: RwLock<HashMap<String, GatewayOutcome>>,
}

impl SimulatedGateway {
    pub fn new(rule: ApprovalRule) -> Self {
        Self {
            rule: RwLock::new(rule),
            latency: RwLock::new(Duration::ZERO),
            answered: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        Self {
            latency: RwLock::new(latency),
            ..self
        }
    }

    pub async fn set_rule(&self, rule: ApprovalRule) {
        *self.rule.write().await = rule;
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Number of distinct charges decided so far.
    pub async fn charge_count(&self) -> usize {
        self.answered.read().await.len()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(ApprovalRule::AlwaysApprove)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayOutcome> {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut answered = self.answered.write().await;
        if let Some(previous) = answered.get(&request.idempotency_key) {
            return Ok(previous.clone());
        }

        let approved = match *self.rule.read().await {
            ApprovalRule::AlwaysApprove => true,
            ApprovalRule::AlwaysDecline => false,
            ApprovalRule::DeclineAbove(limit) => request.amount <= limit,
            ApprovalRule::Unavailable => {
                return Err(SagaError::Gateway("payment gateway unavailable".to_string()));
            }
        };

        let outcome = if approved {
            GatewayOutcome::Approved {
                transaction_id: Uuid::new_v4().to_string(),
            }
        } else {
            GatewayOutcome::Declined {
                reason: "Payment gateway declined transaction".to_string(),
            }
        };
        answered.insert(request.idempotency_key.clone(), outcome.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge(cents: i64) -> ChargeRequest {
        charge_for(1, cents)
    }

    fn charge_for(order: i64, cents: i64) -> ChargeRequest {
        ChargeRequest::for_order(OrderId::new(order), UserId::new(1), Money::from_cents(cents))
    }

    #[tokio::test]
    async fn decline_above_limit() {
        let gateway = SimulatedGateway::new(ApprovalRule::DeclineAbove(Money::from_cents(1000)));

        assert!(matches!(
            gateway.charge(&charge_for(1, 1000)).await.unwrap(),
            GatewayOutcome::Approved { .. }
        ));
        assert!(matches!(
            gateway.charge(&charge_for(2, 1001)).await.unwrap(),
            GatewayOutcome::Declined { .. }
        ));
    }

    #[tokio::test]
    async fn unavailable_gateway_errors() {
        let gateway = SimulatedGateway::default();
        gateway.set_rule(ApprovalRule::Unavailable).await;
        assert!(matches!(
            gateway.charge(&charge(1)).await,
            Err(SagaError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn approvals_carry_distinct_transaction_ids() {
        let gateway = SimulatedGateway::default();
        let a = gateway.charge(&charge_for(1, 1)).await.unwrap();
        let b = gateway.charge(&charge_for(2, 1)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(gateway.charge_count().await, 2);
    }

    #[tokio::test]
    async fn repeated_key_replays_first_answer() {
        let gateway = SimulatedGateway::default();
        let first = gateway.charge(&charge(500)).await.unwrap();

        gateway.set_rule(ApprovalRule::AlwaysDecline).await;
        let again = gateway.charge(&charge(500)).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(gateway.charge_count().await, 1);
    }

    #[tokio::test]
    async fn unavailable_answer_is_not_remembered() {
        let gateway = SimulatedGateway::new(ApprovalRule::Unavailable);
        assert!(gateway.charge(&charge(1)).await.is_err());

        gateway.set_rule(ApprovalRule::AlwaysApprove).await;
        assert!(matches!(
            gateway.charge(&charge(1)).await.unwrap(),
            GatewayOutcome::Approved { .. }
        ));
    }
}
