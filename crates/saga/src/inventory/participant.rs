//! Inventory participant: reserves, confirms and releases stock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId};
use domain::{
    DomainEvent, EventHeader, InventoryFailedData, InventoryFailureCode, InventoryReservedData,
    LineItem, OrderCancelledData, OrderCreatedData, ReservedItem, SagaEvent,
};
use event_bus::{EventEnvelope, EventHandler, HandlerError};

use super::model::{NewProduct, Product, Reservation};
use super::store::InventoryStore;
use crate::error::{Result, SagaError};
use crate::publisher::EventPublisher;

/// Holds stock for new orders and settles it once payment is decided.
pub struct InventoryParticipant<S: InventoryStore> {
    store: S,
    publisher: EventPublisher,
}

impl<S: InventoryStore> InventoryParticipant<S> {
    pub fn new(store: S, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves every item of a new order, or none of them.
    ///
    /// A redelivered event re-emits the outcome recorded the first time
    /// without touching stock again.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_order_created(&self, event: &OrderCreatedData) -> Result<()> {
        let order_id = event.header.order_id;

        if let Some(previous) = self.previous_outcome(event).await? {
            if let SagaEvent::OrderCancelled(_) = previous {
                tracing::info!(order_id = %order_id, "order cancelled before reservation, skipping");
                return Ok(());
            }
            tracing::warn!(
                order_id = %order_id,
                outcome = previous.event_type(),
                "duplicate OrderCreated, re-emitting recorded outcome"
            );
            metrics::counter!("inventory_reservations_total", "outcome" => "duplicate")
                .increment(1);
            self.publisher.publish(&previous).await?;
            return Ok(());
        }

        let requested = merge_items(&event.items)?;
        let outcome = self
            .reserve_all(&event.header, &requested, event.total_amount)
            .await?;

        self.store.record_outcome(order_id, outcome.clone()).await?;
        self.publisher.publish(&outcome).await?;
        Ok(())
    }

    /// Releases the order's stock, or remembers the cancellation when it
    /// overtook the `OrderCreated` event so nothing is reserved later.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.header.order_id))]
    pub async fn on_order_cancelled(&self, event: &OrderCancelledData) -> Result<()> {
        let order_id = event.header.order_id;
        if self.store.outcome(order_id).await?.is_none()
            && self.store.reservations_for_order(order_id).await?.is_empty()
        {
            self.store
                .record_outcome(order_id, SagaEvent::OrderCancelled(event.clone()))
                .await?;
            tracing::info!(order_id = %order_id, "cancellation recorded ahead of reservation");
            return Ok(());
        }
        self.cancel_reservation(order_id).await?;
        Ok(())
    }

    /// Consumes the stock held for an order.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_reservation(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        let confirmed = self.store.confirm_reservations(order_id).await?;
        if confirmed.is_empty() {
            tracing::debug!(order_id = %order_id, "no reserved rows to confirm");
        } else {
            tracing::info!(order_id = %order_id, rows = confirmed.len(), "reservation confirmed");
        }
        Ok(confirmed)
    }

    /// Returns the stock held for an order to the available pool.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_reservation(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        let cancelled = self.store.cancel_reservations(order_id).await?;
        if cancelled.is_empty() {
            tracing::debug!(order_id = %order_id, "no reserved rows to cancel");
        } else {
            tracing::info!(order_id = %order_id, rows = cancelled.len(), "reservation cancelled");
        }
        Ok(cancelled)
    }

    pub async fn register_product(&self, product: NewProduct) -> Result<Product> {
        let product = self.store.register_product(product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, stock = product.stock_quantity, "product registered");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        self.store.get_product(product_id).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.store.list_products().await
    }

    /// Products with at least one unit available.
    pub async fn list_available_products(&self) -> Result<Vec<Product>> {
        let mut products = self.store.list_products().await?;
        products.retain(|p| p.available() > 0);
        Ok(products)
    }

    pub async fn check_availability(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Product", product_id))?;
        Ok(product.available() >= quantity)
    }

    pub async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        self.store.reservations_for_order(order_id).await
    }

    async fn previous_outcome(&self, event: &OrderCreatedData) -> Result<Option<SagaEvent>> {
        let order_id = event.header.order_id;
        if let Some(outcome) = self.store.outcome(order_id).await? {
            return Ok(Some(outcome));
        }

        // Rows without a recorded outcome: the first attempt stopped after
        // reserving. Rebuild the success event from the rows.
        let rows = self.store.reservations_for_order(order_id).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let outcome = SagaEvent::InventoryReserved(InventoryReservedData {
            header: EventHeader::now(order_id, event.header.user_id),
            items: rows
                .iter()
                .map(|row| ReservedItem {
                    product_id: row.product_id,
                    quantity: row.quantity,
                })
                .collect(),
            total_amount: event.total_amount,
        });
        self.store.record_outcome(order_id, outcome.clone()).await?;
        Ok(Some(outcome))
    }

    async fn reserve_all(
        &self,
        header: &EventHeader,
        requested: &[ReservedItem],
        total_amount: Money,
    ) -> Result<SagaEvent> {
        let order_id = header.order_id;
        let (code, reason) = match self.store.reserve_order(order_id, requested).await {
            Ok(rows) => {
                metrics::counter!("inventory_reservations_total", "outcome" => "reserved")
                    .increment(1);
                tracing::info!(order_id = %order_id, items = rows.len(), "inventory reserved");
                return Ok(SagaEvent::InventoryReserved(InventoryReservedData {
                    header: EventHeader::now(order_id, header.user_id),
                    items: requested.to_vec(),
                    total_amount,
                }));
            }
            Err(SagaError::InsufficientStock {
                product_id,
                requested: wanted,
                available,
            }) => {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    requested = wanted,
                    available,
                    "insufficient stock"
                );
                let name = self.product_name(product_id).await?;
                (
                    InventoryFailureCode::InsufficientStock,
                    format!("Insufficient stock for product: {name}"),
                )
            }
            Err(SagaError::NotFound { id, .. }) => {
                tracing::warn!(order_id = %order_id, product_id = %id, "unknown product");
                (
                    InventoryFailureCode::SystemError,
                    format!("Product not found: {id}"),
                )
            }
            Err(other) => return Err(other),
        };

        let label = match code {
            InventoryFailureCode::InsufficientStock => "insufficient_stock",
            InventoryFailureCode::SystemError => "system_error",
        };
        metrics::counter!("inventory_reservations_total", "outcome" => label).increment(1);
        Ok(SagaEvent::InventoryFailed(InventoryFailedData {
            header: EventHeader::now(order_id, header.user_id),
            reason,
            failure_code: code,
        }))
    }

    async fn product_name(&self, product_id: ProductId) -> Result<String> {
        Ok(self
            .store
            .get_product(product_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| product_id.to_string()))
    }
}

/// Sums quantities per product, in ascending product id order.
fn merge_items(items: &[LineItem]) -> Result<Vec<ReservedItem>> {
    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in items {
        let quantity = merged.entry(item.product_id).or_insert(0);
        *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
            SagaError::Validation(format!(
                "quantity for product {} overflows",
                item.product_id
            ))
        })?;
    }
    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| ReservedItem {
            product_id,
            quantity,
        })
        .collect())
}

#[async_trait]
impl<S: InventoryStore + 'static> EventHandler for InventoryParticipant<S> {
    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match SagaEvent::from_envelope(envelope).map_err(SagaError::from)? {
            SagaEvent::OrderCreated(event) => self.on_order_created(&event).await?,
            SagaEvent::PaymentCompleted(event) => {
                self.confirm_reservation(event.header.order_id).await?;
            }
            SagaEvent::PaymentFailed(event) => {
                self.cancel_reservation(event.header.order_id).await?;
            }
            SagaEvent::OrderCancelled(event) => self.on_order_cancelled(&event).await?,
            other => {
                return Err(SagaError::Validation(format!(
                    "inventory participant does not consume {}",
                    other.event_type()
                ))
                .into());
            }
        }
        Ok(())
    }
}
