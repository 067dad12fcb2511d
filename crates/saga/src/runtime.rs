//! Wires the participants to the bus.

use std::sync::Arc;
use std::time::Duration;

use domain::topics;
use event_bus::{DeadLetter, EventBus, EventHandler, InMemoryEventBus};

use crate::billing::{BillingParticipant, InMemoryInvoiceStore};
use crate::config::SagaConfig;
use crate::error::Result;
use crate::inventory::{InMemoryInventoryStore, InventoryParticipant};
use crate::notification::{DeliveryChannels, InMemoryNotificationStore, NotificationParticipant};
use crate::order::{InMemoryOrderStore, OrderParticipant};
use crate::payment::{InMemoryPaymentStore, PaymentParticipant, SimulatedGateway};
use crate::publisher::EventPublisher;

pub const ORDER_GROUP: &str = "order-service-group";
pub const INVENTORY_GROUP: &str = "inventory-service-group";
pub const PAYMENT_GROUP: &str = "payment-service-group";
pub const BILLING_GROUP: &str = "billing-service-group";
pub const NOTIFICATION_GROUP: &str = "notification-service-group";

pub type Orders = OrderParticipant<InMemoryOrderStore>;
pub type Inventory = InventoryParticipant<InMemoryInventoryStore>;
pub type Payments = PaymentParticipant<InMemoryPaymentStore, SimulatedGateway>;
pub type Billing = BillingParticipant<InMemoryInvoiceStore>;
pub type Notifications = NotificationParticipant<InMemoryNotificationStore>;

/// The five participants running over one in-memory bus.
///
/// Participants never call each other; each one only sees the events of
/// the topics it is subscribed to under its own consumer group.
pub struct SagaRuntime {
    bus: InMemoryEventBus,
    orders: Arc<Orders>,
    inventory: Arc<Inventory>,
    payments: Arc<Payments>,
    billing: Arc<Billing>,
    notifications: Arc<Notifications>,
}

impl SagaRuntime {
    /// Builds the participants, subscribes them and relays any pending
    /// order outbox entries.
    pub async fn start(config: SagaConfig) -> Result<Self> {
        let bus = InMemoryEventBus::with_config(config.partitions, config.retry);
        let shared: Arc<dyn EventBus> = Arc::new(bus.clone());
        let publisher = || EventPublisher::new(Arc::clone(&shared), config.retry);

        let runtime = Self {
            orders: Arc::new(OrderParticipant::new(InMemoryOrderStore::new(), publisher())),
            inventory: Arc::new(InventoryParticipant::new(
                InMemoryInventoryStore::new(),
                publisher(),
            )),
            payments: Arc::new(PaymentParticipant::new(
                InMemoryPaymentStore::new(),
                SimulatedGateway::new(config.approval_rule),
                publisher(),
                config.gateway_timeout,
            )),
            billing: Arc::new(BillingParticipant::new(
                InMemoryInvoiceStore::new(),
                publisher(),
                config.tax_rate_bps,
                config.invoice_term_days,
            )),
            notifications: Arc::new(NotificationParticipant::new(
                InMemoryNotificationStore::new(),
                DeliveryChannels::default(),
                publisher(),
                config.notification_channel,
                config.channel_timeout,
            )),
            bus,
        };

        runtime.subscribe_all().await?;
        if let Err(e) = runtime.orders.relay_outbox().await {
            tracing::warn!(error = %e, "outbox relay on startup failed");
        }

        tracing::info!(
            partitions = config.partitions,
            max_attempts = config.retry.max_attempts,
            "saga runtime started"
        );
        Ok(runtime)
    }

    async fn subscribe_all(&self) -> Result<()> {
        let orders: Arc<dyn EventHandler> = self.orders.clone();
        let inventory: Arc<dyn EventHandler> = self.inventory.clone();
        let payments: Arc<dyn EventHandler> = self.payments.clone();
        let billing: Arc<dyn EventHandler> = self.billing.clone();
        let notifications: Arc<dyn EventHandler> = self.notifications.clone();

        let subscriptions = [
            (topics::PAYMENT_COMPLETED, ORDER_GROUP, &orders),
            (topics::PAYMENT_FAILED, ORDER_GROUP, &orders),
            (topics::INVENTORY_FAILED, ORDER_GROUP, &orders),
            (topics::ORDER_CREATED, INVENTORY_GROUP, &inventory),
            (topics::PAYMENT_COMPLETED, INVENTORY_GROUP, &inventory),
            (topics::PAYMENT_FAILED, INVENTORY_GROUP, &inventory),
            (topics::ORDER_CANCELLED, INVENTORY_GROUP, &inventory),
            (topics::INVENTORY_RESERVED, PAYMENT_GROUP, &payments),
            (topics::PAYMENT_COMPLETED, BILLING_GROUP, &billing),
            (topics::ORDER_CREATED, NOTIFICATION_GROUP, &notifications),
            (topics::INVOICE_GENERATED, NOTIFICATION_GROUP, &notifications),
        ];

        for (topic, group, handler) in subscriptions {
            self.bus.subscribe(topic, group, Arc::clone(handler)).await?;
            tracing::debug!(topic, group, "subscribed");
        }
        Ok(())
    }

    pub fn bus(&self) -> &InMemoryEventBus {
        &self.bus
    }

    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn payments(&self) -> &Payments {
        &self.payments
    }

    pub fn billing(&self) -> &Billing {
        &self.billing
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Waits until every subscription has caught up with its topic.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.bus.wait_until_idle(timeout).await
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.bus.dead_letters().await
    }

    /// Stops all consumer workers.
    pub async fn shutdown(&self) {
        self.bus.shutdown().await;
        tracing::info!("saga runtime stopped");
    }
}
