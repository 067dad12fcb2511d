//! Topic names, one per event type.

pub const ORDER_CREATED: &str = "order-created";
pub const ORDER_CONFIRMED: &str = "order-confirmed";
pub const ORDER_FAILED: &str = "order-failed";
pub const ORDER_CANCELLED: &str = "order-cancelled";
pub const INVENTORY_RESERVED: &str = "inventory-reserved";
pub const INVENTORY_FAILED: &str = "inventory-failed";
pub const PAYMENT_COMPLETED: &str = "payment-completed";
pub const PAYMENT_FAILED: &str = "payment-failed";
pub const INVOICE_GENERATED: &str = "invoice-generated";
pub const NOTIFICATION_SENT: &str = "notification-sent";

/// Every topic, in saga order.
pub const ALL: [&str; 10] = [
    ORDER_CREATED,
    INVENTORY_RESERVED,
    INVENTORY_FAILED,
    PAYMENT_COMPLETED,
    PAYMENT_FAILED,
    ORDER_CONFIRMED,
    ORDER_FAILED,
    ORDER_CANCELLED,
    INVOICE_GENERATED,
    NOTIFICATION_SENT,
];
