//! Saga event payloads and their envelope form.

use chrono::{DateTime, SubsecRound, Utc};
use common::{InvoiceId, Money, OrderId, PaymentId, UserId};
use event_bus::EventEnvelope;
use serde::{Deserialize, Serialize};

use crate::codes::{ChannelType, InventoryFailureCode, OrderFailureCode, PaymentFailureCode};
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::items::{LineItem, ReservedItem, order_total};
use crate::topics;

/// Fields every saga event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl EventHeader {
    /// Header stamped with the current time, truncated to the millisecond
    /// precision of the wire format.
    pub fn now(order_id: OrderId, user_id: UserId) -> Self {
        Self {
            order_id,
            user_id,
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFailedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub reason: String,
    pub failure_code: OrderFailureCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReservedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub items: Vec<ReservedItem>,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFailedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub reason: String,
    pub failure_code: InventoryFailureCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompletedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub transaction_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub reason: String,
    pub failure_code: PaymentFailureCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceGeneratedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSentData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notification_type: ChannelType,
    pub recipient: String,
}

/// Every event exchanged between saga participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload")]
pub enum SagaEvent {
    OrderCreated(OrderCreatedData),
    OrderConfirmed(OrderConfirmedData),
    OrderFailed(OrderFailedData),
    OrderCancelled(OrderCancelledData),
    InventoryReserved(InventoryReservedData),
    InventoryFailed(InventoryFailedData),
    PaymentCompleted(PaymentCompletedData),
    PaymentFailed(PaymentFailedData),
    InvoiceGenerated(InvoiceGeneratedData),
    NotificationSent(NotificationSentData),
}

impl SagaEvent {
    /// Returns the common header.
    pub fn header(&self) -> &EventHeader {
        match self {
            SagaEvent::OrderCreated(e) => &e.header,
            SagaEvent::OrderConfirmed(e) => &e.header,
            SagaEvent::OrderFailed(e) => &e.header,
            SagaEvent::OrderCancelled(e) => &e.header,
            SagaEvent::InventoryReserved(e) => &e.header,
            SagaEvent::InventoryFailed(e) => &e.header,
            SagaEvent::PaymentCompleted(e) => &e.header,
            SagaEvent::PaymentFailed(e) => &e.header,
            SagaEvent::InvoiceGenerated(e) => &e.header,
            SagaEvent::NotificationSent(e) => &e.header,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.header().user_id
    }

    /// Wraps the event in a bus envelope keyed by order id.
    pub fn to_envelope(&self) -> Result<EventEnvelope, DomainError> {
        let (event_type, key) = (self.event_type(), self.key());
        let envelope = match self {
            SagaEvent::OrderCreated(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::OrderConfirmed(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::OrderFailed(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::OrderCancelled(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::InventoryReserved(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::InventoryFailed(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::PaymentCompleted(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::PaymentFailed(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::InvoiceGenerated(e) => EventEnvelope::encode(event_type, key, e)?,
            SagaEvent::NotificationSent(e) => EventEnvelope::encode(event_type, key, e)?,
        };
        Ok(envelope.at(self.header().timestamp))
    }

    /// Decodes and validates an envelope received from the bus.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, DomainError> {
        let event = match envelope.event_type.as_str() {
            "OrderCreated" => SagaEvent::OrderCreated(envelope.decode()?),
            "OrderConfirmed" => SagaEvent::OrderConfirmed(envelope.decode()?),
            "OrderFailed" => SagaEvent::OrderFailed(envelope.decode()?),
            "OrderCancelled" => SagaEvent::OrderCancelled(envelope.decode()?),
            "InventoryReserved" => SagaEvent::InventoryReserved(envelope.decode()?),
            "InventoryFailed" => SagaEvent::InventoryFailed(envelope.decode()?),
            "PaymentCompleted" => SagaEvent::PaymentCompleted(envelope.decode()?),
            "PaymentFailed" => SagaEvent::PaymentFailed(envelope.decode()?),
            "InvoiceGenerated" => SagaEvent::InvoiceGenerated(envelope.decode()?),
            "NotificationSent" => SagaEvent::NotificationSent(envelope.decode()?),
            other => return Err(DomainError::UnknownEventType(other.to_string())),
        };

        if envelope.key != event.key() {
            return Err(DomainError::validation(
                event.event_type(),
                format!(
                    "key {} does not match order id {}",
                    envelope.key,
                    event.order_id()
                ),
            ));
        }

        event.validate()?;
        Ok(event)
    }

    /// Checks the payload invariants the producers guarantee.
    pub fn validate(&self) -> Result<(), DomainError> {
        let event_type = self.event_type();
        match self {
            SagaEvent::OrderCreated(e) => {
                if e.items.is_empty() {
                    return Err(DomainError::validation(event_type, "order has no items"));
                }
                for item in &e.items {
                    if item.quantity == 0 {
                        return Err(DomainError::validation(
                            event_type,
                            format!("quantity for product {} must be positive", item.product_id),
                        ));
                    }
                    if item.unit_price.is_negative() {
                        return Err(DomainError::validation(
                            event_type,
                            format!("negative unit price for product {}", item.product_id),
                        ));
                    }
                }
                let expected = order_total(&e.items).ok_or_else(|| {
                    DomainError::validation(event_type, "order total overflows")
                })?;
                if expected != e.total_amount {
                    return Err(DomainError::validation(
                        event_type,
                        format!("total {} does not match items {}", e.total_amount, expected),
                    ));
                }
            }
            SagaEvent::InventoryReserved(e) => {
                if e.items.is_empty() {
                    return Err(DomainError::validation(event_type, "no reserved items"));
                }
                if e.items.iter().any(|item| item.quantity == 0) {
                    return Err(DomainError::validation(
                        event_type,
                        "reserved quantity must be positive",
                    ));
                }
                if e.total_amount.is_negative() {
                    return Err(DomainError::validation(event_type, "negative total"));
                }
            }
            SagaEvent::PaymentCompleted(e) => {
                if e.amount.is_negative() {
                    return Err(DomainError::validation(event_type, "negative amount"));
                }
            }
            SagaEvent::InvoiceGenerated(e) => {
                if e.invoice_number.is_empty() {
                    return Err(DomainError::validation(event_type, "empty invoice number"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::OrderCreated(_) => "OrderCreated",
            SagaEvent::OrderConfirmed(_) => "OrderConfirmed",
            SagaEvent::OrderFailed(_) => "OrderFailed",
            SagaEvent::OrderCancelled(_) => "OrderCancelled",
            SagaEvent::InventoryReserved(_) => "InventoryReserved",
            SagaEvent::InventoryFailed(_) => "InventoryFailed",
            SagaEvent::PaymentCompleted(_) => "PaymentCompleted",
            SagaEvent::PaymentFailed(_) => "PaymentFailed",
            SagaEvent::InvoiceGenerated(_) => "InvoiceGenerated",
            SagaEvent::NotificationSent(_) => "NotificationSent",
        }
    }

    fn topic(&self) -> &'static str {
        match self {
            SagaEvent::OrderCreated(_) => topics::ORDER_CREATED,
            SagaEvent::OrderConfirmed(_) => topics::ORDER_CONFIRMED,
            SagaEvent::OrderFailed(_) => topics::ORDER_FAILED,
            SagaEvent::OrderCancelled(_) => topics::ORDER_CANCELLED,
            SagaEvent::InventoryReserved(_) => topics::INVENTORY_RESERVED,
            SagaEvent::InventoryFailed(_) => topics::INVENTORY_FAILED,
            SagaEvent::PaymentCompleted(_) => topics::PAYMENT_COMPLETED,
            SagaEvent::PaymentFailed(_) => topics::PAYMENT_FAILED,
            SagaEvent::InvoiceGenerated(_) => topics::INVOICE_GENERATED,
            SagaEvent::NotificationSent(_) => topics::NOTIFICATION_SENT,
        }
    }

    fn order_id(&self) -> OrderId {
        self.header().order_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header() -> EventHeader {
        EventHeader::now(OrderId::new(42), UserId::new(7))
    }

    fn order_created() -> SagaEvent {
        SagaEvent::OrderCreated(OrderCreatedData {
            header: header(),
            items: vec![
                LineItem::new(1, 2, Money::from_cents(1500)),
                LineItem::new(2, 1, Money::from_cents(500)),
            ],
            total_amount: Money::from_cents(3500),
        })
    }

    #[test]
    fn envelope_is_keyed_by_order_id() {
        let envelope = order_created().to_envelope().unwrap();
        assert_eq!(envelope.key, "42");
        assert_eq!(envelope.event_type, "OrderCreated");
    }

    #[test]
    fn payload_uses_flat_camel_case_fields() {
        let event = SagaEvent::PaymentFailed(PaymentFailedData {
            header: header(),
            reason: "declined".into(),
            failure_code: PaymentFailureCode::GatewayError,
        });
        let envelope = event.to_envelope().unwrap();
        let payload = envelope.payload;

        assert_eq!(payload["orderId"], json!(42));
        assert_eq!(payload["userId"], json!(7));
        assert!(payload["timestamp"].is_i64());
        assert_eq!(payload["failureCode"], json!("GATEWAY_ERROR"));
    }

    #[test]
    fn envelope_decodes_back_to_same_event() {
        let event = order_created();
        let decoded = SagaEvent::from_envelope(&event.to_envelope().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let mut envelope = order_created().to_envelope().unwrap();
        envelope.event_type = "OrderShipped".into();
        assert!(matches!(
            SagaEvent::from_envelope(&envelope),
            Err(DomainError::UnknownEventType(t)) if t == "OrderShipped"
        ));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let mut envelope = order_created().to_envelope().unwrap();
        envelope.key = "43".into();
        assert!(matches!(
            SagaEvent::from_envelope(&envelope),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn order_created_without_items_is_rejected() {
        let event = SagaEvent::OrderCreated(OrderCreatedData {
            header: header(),
            items: vec![],
            total_amount: Money::zero(),
        });
        assert!(event.validate().is_err());
    }

    #[test]
    fn order_created_with_zero_quantity_is_rejected() {
        let event = SagaEvent::OrderCreated(OrderCreatedData {
            header: header(),
            items: vec![LineItem::new(1, 0, Money::from_cents(100))],
            total_amount: Money::zero(),
        });
        assert!(event.validate().is_err());
    }

    #[test]
    fn order_created_with_wrong_total_is_rejected() {
        let event = SagaEvent::OrderCreated(OrderCreatedData {
            header: header(),
            items: vec![LineItem::new(1, 2, Money::from_cents(100))],
            total_amount: Money::from_cents(150),
        });
        assert!(event.validate().is_err());
    }

    #[test]
    fn order_created_with_overflowing_total_is_rejected() {
        let event = SagaEvent::OrderCreated(OrderCreatedData {
            header: header(),
            items: vec![LineItem::new(1, 2, Money::from_cents(i64::MAX / 2 + 1))],
            total_amount: Money::from_cents(i64::MIN),
        });
        match event.validate() {
            Err(DomainError::Validation { reason, .. }) => assert!(reason.contains("overflows")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        let mut envelope = order_created().to_envelope().unwrap();
        envelope.payload = json!({"orderId": "not-a-number"});
        assert!(matches!(
            SagaEvent::from_envelope(&envelope),
            Err(DomainError::Serialization(_))
        ));
    }

    #[test]
    fn every_event_maps_to_its_own_topic() {
        let h = header();
        let events = vec![
            order_created(),
            SagaEvent::InventoryFailed(InventoryFailedData {
                header: h,
                reason: "none left".into(),
                failure_code: InventoryFailureCode::InsufficientStock,
            }),
            SagaEvent::OrderCancelled(OrderCancelledData {
                header: h,
                reason: "changed mind".into(),
            }),
        ];
        let names: Vec<_> = events.iter().map(|e| e.topic()).collect();
        assert_eq!(
            names,
            vec![
                topics::ORDER_CREATED,
                topics::INVENTORY_FAILED,
                topics::ORDER_CANCELLED
            ]
        );
    }
}
