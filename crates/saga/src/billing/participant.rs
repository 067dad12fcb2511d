//! Billing participant: issues one invoice per paid order.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{InvoiceId, OrderId, UserId};
use domain::{DomainEvent, EventHeader, InvoiceGeneratedData, PaymentCompletedData, SagaEvent};
use event_bus::{EventEnvelope, EventHandler, HandlerError};
use uuid::Uuid;

use super::model::{Invoice, InvoiceStatus, NewInvoice};
use super::store::{InvoiceInsert, InvoiceStore};
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Attempts at drawing an unused invoice number before giving up.
const MAX_NUMBER_ATTEMPTS: u32 = 10;

/// Source of candidate invoice numbers.
pub type InvoiceNumberSource = Box<dyn Fn() -> String + Send + Sync>;

/// `INV-` followed by eight upper-case hex characters.
pub fn random_invoice_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("INV-{}", hex[..8].to_uppercase())
}

pub struct BillingParticipant<S: InvoiceStore> {
    store: S,
    publisher: EventPublisher,
    tax_rate_bps: u32,
    term: Duration,
    numbers: InvoiceNumberSource,
}

impl<S: InvoiceStore> BillingParticipant<S> {
    pub fn new(store: S, publisher: EventPublisher, tax_rate_bps: u32, term_days: i64) -> Self {
        Self {
            store,
            publisher,
            tax_rate_bps,
            term: Duration::days(term_days),
            numbers: Box::new(random_invoice_number),
        }
    }

    /// Replaces the invoice number generator.
    pub fn with_number_source(mut self, numbers: InvoiceNumberSource) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues the invoice for a completed payment.
    ///
    /// A redelivered event writes nothing. It publishes only if the stored
    /// invoice was never announced, reusing its id and number.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_payment_completed(&self, event: &PaymentCompletedData) -> Result<()> {
        let header = event.header;
        let invoice = match self.store.find_by_order(header.order_id).await? {
            Some(existing) if existing.published => {
                tracing::warn!(
                    order_id = %header.order_id,
                    invoice_number = %existing.invoice_number,
                    "invoice already generated, skipping"
                );
                return Ok(());
            }
            Some(existing) => {
                tracing::warn!(
                    order_id = %header.order_id,
                    invoice_number = %existing.invoice_number,
                    "invoice was never announced, re-emitting"
                );
                existing
            }
            None => match self.issue(event).await? {
                Some(invoice) => invoice,
                None => return Ok(()),
            },
        };

        self.publisher
            .publish(&SagaEvent::InvoiceGenerated(InvoiceGeneratedData {
                header: EventHeader::now(invoice.order_id, invoice.user_id),
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                total_amount: invoice.total_amount,
            }))
            .await?;
        self.store.mark_published(invoice.order_id).await?;
        Ok(())
    }

    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Option<Invoice>> {
        self.store.find(invoice_id).await
    }

    pub async fn invoice_for_order(&self, order_id: OrderId) -> Result<Option<Invoice>> {
        self.store.find_by_order(order_id).await
    }

    pub async fn invoices_for_user(&self, user_id: UserId) -> Result<Vec<Invoice>> {
        self.store.list_by_user(user_id).await
    }

    /// Stores a new invoice under a fresh number. `None` means a concurrent
    /// delivery stored one first.
    async fn issue(&self, event: &PaymentCompletedData) -> Result<Option<Invoice>> {
        let header = event.header;
        let overflow =
            || SagaError::Validation(format!("invoice total for {} overflows", event.amount));
        let tax_amount = event
            .amount
            .percentage_bps(self.tax_rate_bps)
            .ok_or_else(overflow)?;
        let total_amount = event.amount.checked_add(tax_amount).ok_or_else(overflow)?;
        let issue_date = Utc::now();

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let candidate = NewInvoice {
                order_id: header.order_id,
                user_id: header.user_id,
                payment_id: event.payment_id,
                invoice_number: (self.numbers)(),
                amount: event.amount,
                tax_amount,
                total_amount,
                status: InvoiceStatus::Issued,
                issue_date,
                due_date: issue_date + self.term,
            };
            match self.store.insert(candidate).await? {
                InvoiceInsert::Inserted(invoice) => {
                    metrics::counter!("invoices_generated_total").increment(1);
                    tracing::info!(
                        order_id = %invoice.order_id,
                        invoice_number = %invoice.invoice_number,
                        total = %invoice.total_amount,
                        "invoice generated"
                    );
                    return Ok(Some(invoice));
                }
                InvoiceInsert::OrderExists => {
                    tracing::warn!(order_id = %header.order_id, "concurrent invoice won the insert, skipping");
                    return Ok(None);
                }
                InvoiceInsert::NumberTaken => {
                    tracing::debug!(attempt, "invoice number collision, drawing another");
                }
            }
        }
        Err(SagaError::System(format!(
            "no unused invoice number after {MAX_NUMBER_ATTEMPTS} attempts"
        )))
    }
}

#[async_trait]
impl<S: InvoiceStore + 'static> EventHandler for BillingParticipant<S> {
    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match SagaEvent::from_envelope(envelope).map_err(SagaError::from)? {
            SagaEvent::PaymentCompleted(event) => self.on_payment_completed(&event).await?,
            other => {
                return Err(SagaError::Validation(format!(
                    "billing participant does not consume {}",
                    other.event_type()
                ))
                .into());
            }
        }
        Ok(())
    }
}
