//! Stock, reservation and outcome persistence.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId};
use domain::{ReservedItem, SagaEvent};
use tokio::sync::RwLock;

use super::model::{NewProduct, Product, Reservation, ReservationStatus};
use crate::error::{Result, SagaError};

/// Storage owned by the inventory participant.
///
/// Stock counters are only changed through compare-and-set style
/// operations that check the reservation invariant under the write lock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn register_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Reserves every item for the order, or nothing.
    ///
    /// Items are checked in ascending product id order. The first unknown
    /// product fails with `NotFound` and the first short one with
    /// `InsufficientStock`. An order that already has rows fails with
    /// `Conflict`. On success every reserved counter is raised and one
    /// `Reserved` row is written per item.
    async fn reserve_order(
        &self,
        order_id: OrderId,
        items: &[ReservedItem],
    ) -> Result<Vec<Reservation>>;

    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>>;

    /// Turns the order's reserved rows into consumed stock. Returns the rows
    /// that changed.
    async fn confirm_reservations(&self, order_id: OrderId) -> Result<Vec<Reservation>>;

    /// Releases the order's reserved rows. Returns the rows that changed.
    async fn cancel_reservations(&self, order_id: OrderId) -> Result<Vec<Reservation>>;

    /// Remembers the outcome event emitted for an order.
    async fn record_outcome(&self, order_id: OrderId, event: SagaEvent) -> Result<()>;

    async fn outcome(&self, order_id: OrderId) -> Result<Option<SagaEvent>>;
}

#[derive(Debug, Default)]
struct InventoryState {
    products: BTreeMap<ProductId, Product>,
    reservations: BTreeMap<(OrderId, ProductId), Reservation>,
    outcomes: HashMap<OrderId, SagaEvent>,
    next_product_id: i64,
}

impl InventoryState {
    fn order_rows(order_id: OrderId) -> RangeInclusive<(OrderId, ProductId)> {
        (order_id, ProductId::new(i64::MIN))..=(order_id, ProductId::new(i64::MAX))
    }

    fn product_mut(&mut self, product_id: ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(&product_id)
            .ok_or_else(|| SagaError::not_found("Product", product_id))
    }
}

/// In-memory inventory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<InventoryState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a system error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SagaError::System("inventory store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn register_product(&self, product: NewProduct) -> Result<Product> {
        self.check_writable()?;
        if product.name.trim().is_empty() {
            return Err(SagaError::Validation("product name must not be empty".to_string()));
        }
        if product.price.is_negative() {
            return Err(SagaError::Validation("product price must not be negative".to_string()));
        }

        let mut state = self.state.write().await;
        if state.products.values().any(|p| p.name == product.name) {
            return Err(SagaError::Conflict(format!(
                "product {} already exists",
                product.name
            )));
        }
        state.next_product_id += 1;
        let created = Product {
            id: ProductId::new(state.next_product_id),
            name: product.name,
            price: product.price,
            stock_quantity: product.stock_quantity,
            reserved_quantity: 0,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }

    async fn reserve_order(
        &self,
        order_id: OrderId,
        items: &[ReservedItem],
    ) -> Result<Vec<Reservation>> {
        self.check_writable()?;

        let mut requested: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in items {
            if requested.insert(item.product_id, item.quantity).is_some() {
                return Err(SagaError::Validation(format!(
                    "product {} listed twice in reservation",
                    item.product_id
                )));
            }
        }

        let mut state = self.state.write().await;
        if state
            .reservations
            .range(InventoryState::order_rows(order_id))
            .next()
            .is_some()
        {
            return Err(SagaError::Conflict(format!(
                "order {order_id} already has reservations"
            )));
        }

        // Check every counter before touching any of them.
        for (&product_id, &quantity) in &requested {
            let product = state.product_mut(product_id)?;
            let available = product.available();
            if available < quantity {
                return Err(SagaError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available,
                });
            }
        }

        let now = Utc::now();
        let mut rows = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            state.product_mut(product_id)?.reserved_quantity += quantity;
            let row = Reservation {
                order_id,
                product_id,
                quantity,
                status: ReservationStatus::Reserved,
                created_at: now,
                updated_at: now,
            };
            state.reservations.insert((order_id, product_id), row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .range(InventoryState::order_rows(order_id))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn confirm_reservations(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let pending: Vec<(ProductId, u32)> = state
            .reservations
            .range(InventoryState::order_rows(order_id))
            .filter(|(_, row)| row.status == ReservationStatus::Reserved)
            .map(|(_, row)| (row.product_id, row.quantity))
            .collect();

        // Check every counter before touching any of them.
        for (product_id, quantity) in &pending {
            let product = state.product_mut(*product_id)?;
            if product.reserved_quantity < *quantity || product.stock_quantity < *quantity {
                return Err(SagaError::System(format!(
                    "reservation of {quantity} for product {product_id} exceeds its counters"
                )));
            }
        }

        let now = Utc::now();
        let mut changed = Vec::with_capacity(pending.len());
        for (product_id, quantity) in pending {
            let product = state.product_mut(product_id)?;
            product.stock_quantity -= quantity;
            product.reserved_quantity -= quantity;
            if let Some(row) = state.reservations.get_mut(&(order_id, product_id)) {
                row.status = ReservationStatus::Confirmed;
                row.updated_at = now;
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }

    async fn cancel_reservations(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let pending: Vec<(ProductId, u32)> = state
            .reservations
            .range(InventoryState::order_rows(order_id))
            .filter(|(_, row)| row.status == ReservationStatus::Reserved)
            .map(|(_, row)| (row.product_id, row.quantity))
            .collect();

        for (product_id, quantity) in &pending {
            let product = state.product_mut(*product_id)?;
            if product.reserved_quantity < *quantity {
                return Err(SagaError::System(format!(
                    "reservation of {quantity} for product {product_id} exceeds reserved counter"
                )));
            }
        }

        let now = Utc::now();
        let mut changed = Vec::with_capacity(pending.len());
        for (product_id, quantity) in pending {
            state.product_mut(product_id)?.reserved_quantity -= quantity;
            if let Some(row) = state.reservations.get_mut(&(order_id, product_id)) {
                row.status = ReservationStatus::Cancelled;
                row.updated_at = now;
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }

    async fn record_outcome(&self, order_id: OrderId, event: SagaEvent) -> Result<()> {
        self.check_writable()?;
        self.state.write().await.outcomes.insert(order_id, event);
        Ok(())
    }

    async fn outcome(&self, order_id: OrderId) -> Result<Option<SagaEvent>> {
        Ok(self.state.read().await.outcomes.get(&order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;

    async fn store_with(stock: u32) -> (InMemoryInventoryStore, ProductId) {
        let store = InMemoryInventoryStore::new();
        let product = store
            .register_product(NewProduct::new("Widget", Money::from_cents(500), stock))
            .await
            .unwrap();
        (store, product.id)
    }

    fn item(product_id: ProductId, quantity: u32) -> ReservedItem {
        ReservedItem {
            product_id,
            quantity,
        }
    }

    async fn reserved(store: &InMemoryInventoryStore, id: ProductId) -> u32 {
        store.get_product(id).await.unwrap().unwrap().reserved_quantity
    }

    #[tokio::test]
    async fn reserve_is_refused_beyond_available() {
        let (store, id) = store_with(5).await;

        store.reserve_order(OrderId::new(1), &[item(id, 3)]).await.unwrap();
        let err = store
            .reserve_order(OrderId::new(2), &[item(id, 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::InsufficientStock { requested: 3, available: 2, .. }
        ));

        assert_eq!(reserved(&store, id).await, 3);
        assert!(store.reservations_for_order(OrderId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_short_item_leaves_every_counter_untouched() {
        let (store, plenty) = store_with(10).await;
        let scarce = store
            .register_product(NewProduct::new("Gadget", Money::from_cents(100), 1))
            .await
            .unwrap()
            .id;

        let err = store
            .reserve_order(OrderId::new(1), &[item(plenty, 4), item(scarce, 2)])
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::InsufficientStock { .. }));
        assert_eq!(reserved(&store, plenty).await, 0);
        assert_eq!(reserved(&store, scarce).await, 0);
        assert!(store.reservations_for_order(OrderId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_reserves_nothing() {
        let (store, id) = store_with(10).await;

        let err = store
            .reserve_order(OrderId::new(1), &[item(id, 1), item(ProductId::new(404), 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::NotFound { .. }));
        assert_eq!(reserved(&store, id).await, 0);
    }

    #[tokio::test]
    async fn unavailable_store_reserves_nothing() {
        let (store, id) = store_with(5).await;
        store.set_fail_writes(true);

        let err = store
            .reserve_order(OrderId::new(1), &[item(id, 2)])
            .await
            .unwrap_err();

        assert!(err.is_transient());
        store.set_fail_writes(false);
        assert_eq!(reserved(&store, id).await, 0);
        assert!(store.reservations_for_order(OrderId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_consumes_stock_once() {
        let (store, id) = store_with(5).await;
        let order = OrderId::new(1);
        store.reserve_order(order, &[item(id, 2)]).await.unwrap();

        assert_eq!(store.confirm_reservations(order).await.unwrap().len(), 1);
        assert!(store.confirm_reservations(order).await.unwrap().is_empty());

        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 3);
        assert_eq!(product.reserved_quantity, 0);
    }

    #[tokio::test]
    async fn cancel_after_confirm_changes_nothing() {
        let (store, id) = store_with(5).await;
        let order = OrderId::new(1);
        store.reserve_order(order, &[item(id, 2)]).await.unwrap();
        store.confirm_reservations(order).await.unwrap();

        assert!(store.cancel_reservations(order).await.unwrap().is_empty());
        let rows = store.reservations_for_order(order).await.unwrap();
        assert_eq!(rows[0].status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn reservations_are_created_once_per_order() {
        let (store, id) = store_with(5).await;
        let order = OrderId::new(4);

        store.reserve_order(order, &[item(id, 1)]).await.unwrap();
        assert!(matches!(
            store.reserve_order(order, &[item(id, 1)]).await,
            Err(SagaError::Conflict(_))
        ));
        assert_eq!(reserved(&store, id).await, 1);
        assert!(store.reservations_for_order(OrderId::new(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_product_names_are_rejected() {
        let (store, _) = store_with(1).await;
        let err = store
            .register_product(NewProduct::new("Widget", Money::from_cents(1), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Conflict(_)));
    }
}
