//! Payment participant: charges reserved orders exactly once.

use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use domain::{
    DomainEvent, EventHeader, InventoryReservedData, PaymentCompletedData, PaymentFailedData,
    PaymentFailureCode, SagaEvent,
};
use event_bus::{EventEnvelope, EventHandler, HandlerError};

use super::gateway::{ChargeRequest, GatewayOutcome, PaymentGateway};
use super::model::{NewPayment, Payment, PaymentStatus};
use super::store::PaymentStore;
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Charges the order total once inventory is held.
pub struct PaymentParticipant<S: PaymentStore, G: PaymentGateway> {
    store: S,
    gateway: G,
    publisher: EventPublisher,
    gateway_timeout: Duration,
}

impl<S: PaymentStore, G: PaymentGateway> PaymentParticipant<S, G> {
    pub fn new(store: S, gateway: G, publisher: EventPublisher, gateway_timeout: Duration) -> Self {
        Self {
            store,
            gateway,
            publisher,
            gateway_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Charges the reserved order unless a payment for it already exists.
    ///
    /// Every charge ends in a stored payment and a `PaymentCompleted` or
    /// `PaymentFailed` event; gateway errors and timeouts count as failures.
    /// A payment whose event never reached the bus is announced again on
    /// redelivery, with the stored payment id and transaction id.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_inventory_reserved(&self, event: &InventoryReservedData) -> Result<()> {
        let header = event.header;
        let payment = match self.store.find_by_order(header.order_id).await? {
            Some(existing) if existing.published => {
                tracing::warn!(
                    order_id = %header.order_id,
                    payment_id = %existing.id,
                    "payment already processed, skipping"
                );
                return Ok(());
            }
            Some(existing) => {
                tracing::warn!(
                    order_id = %header.order_id,
                    payment_id = %existing.id,
                    "payment outcome was never published, re-emitting"
                );
                existing
            }
            None => {
                let request =
                    ChargeRequest::for_order(header.order_id, header.user_id, event.total_amount);
                let charged = self.charge(&request).await;
                let Some(payment) = self.store.insert_if_absent(charged).await? else {
                    tracing::warn!(order_id = %header.order_id, "concurrent payment won the insert, skipping");
                    return Ok(());
                };
                record(&payment);
                payment
            }
        };

        self.publisher.publish(&outcome_event(&payment)).await?;
        self.store.mark_published(payment.order_id).await?;
        Ok(())
    }

    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.store.find(payment_id).await
    }

    pub async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        self.store.find_by_order(order_id).await
    }

    pub async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        self.store.list_by_user(user_id).await
    }

    async fn charge(&self, request: &ChargeRequest) -> NewPayment {
        let answer = tokio::time::timeout(self.gateway_timeout, self.gateway.charge(request)).await;

        let (status, transaction_id, failure) = match answer {
            Ok(Ok(GatewayOutcome::Approved { transaction_id })) => {
                (PaymentStatus::Completed, Some(transaction_id), None)
            }
            Ok(Ok(GatewayOutcome::Declined { reason })) => (
                PaymentStatus::Failed,
                None,
                Some((reason, PaymentFailureCode::GatewayError)),
            ),
            Ok(Err(e)) => {
                tracing::error!(order_id = %request.order_id, error = %e, "payment gateway error");
                (
                    PaymentStatus::Failed,
                    None,
                    Some((e.to_string(), PaymentFailureCode::SystemError)),
                )
            }
            Err(_) => {
                tracing::error!(
                    order_id = %request.order_id,
                    timeout_ms = self.gateway_timeout.as_millis() as u64,
                    "payment gateway timed out"
                );
                (
                    PaymentStatus::Failed,
                    None,
                    Some((
                        format!(
                            "Payment gateway timed out after {}ms",
                            self.gateway_timeout.as_millis()
                        ),
                        PaymentFailureCode::SystemError,
                    )),
                )
            }
        };

        let (failure_reason, failure_code) = match failure {
            Some((reason, code)) => (Some(reason), Some(code)),
            None => (None, None),
        };
        NewPayment {
            order_id: request.order_id,
            user_id: request.user_id,
            amount: request.amount,
            status,
            transaction_id,
            failure_reason,
            failure_code,
        }
    }
}

fn record(payment: &Payment) {
    match payment.status {
        PaymentStatus::Completed => {
            metrics::counter!("payments_processed_total", "status" => "completed").increment(1);
            tracing::info!(order_id = %payment.order_id, payment_id = %payment.id, amount = %payment.amount, "payment completed");
        }
        PaymentStatus::Failed => {
            metrics::counter!("payments_processed_total", "status" => "failed").increment(1);
            tracing::warn!(
                order_id = %payment.order_id,
                reason = payment.failure_reason.as_deref().unwrap_or_default(),
                "payment failed"
            );
        }
    }
}

/// The event announcing a stored payment.
fn outcome_event(payment: &Payment) -> SagaEvent {
    let header = EventHeader::now(payment.order_id, payment.user_id);
    match payment.status {
        PaymentStatus::Completed => SagaEvent::PaymentCompleted(PaymentCompletedData {
            header,
            payment_id: payment.id,
            transaction_id: payment.transaction_id.clone().unwrap_or_default(),
            amount: payment.amount,
        }),
        PaymentStatus::Failed => SagaEvent::PaymentFailed(PaymentFailedData {
            header,
            reason: payment.failure_reason.clone().unwrap_or_default(),
            failure_code: payment
                .failure_code
                .unwrap_or(PaymentFailureCode::SystemError),
        }),
    }
}

#[async_trait]
impl<S, G> EventHandler for PaymentParticipant<S, G>
where
    S: PaymentStore + 'static,
    G: PaymentGateway + 'static,
{
    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match SagaEvent::from_envelope(envelope).map_err(SagaError::from)? {
            SagaEvent::InventoryReserved(event) => self.on_inventory_reserved(&event).await?,
            other => {
                return Err(SagaError::Validation(format!(
                    "payment participant does not consume {}",
                    other.event_type()
                ))
                .into());
            }
        }
        Ok(())
    }
}
