use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer-assigned identity of one published event. Redeliveries of the
/// same record carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A record on a topic: a typed JSON payload plus routing data.
///
/// The bus only looks at `key`; everything else travels untouched to the
/// subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Name of the payload contract, e.g. `OrderCreated`.
    pub event_type: String,

    /// Partition key. Records with equal keys are delivered in publish order.
    pub key: String,

    pub timestamp: DateTime<Utc>,

    pub payload: serde_json::Value,

    /// Free-form string headers, like the headers of a Kafka record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl EventEnvelope {
    /// Wraps an already encoded payload, stamped now.
    pub fn new(
        event_type: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::random(),
            event_type: event_type.into(),
            key: key.into(),
            timestamp: Utc::now(),
            payload,
            headers: BTreeMap::new(),
        }
    }

    /// Encodes `payload` as JSON and wraps it.
    pub fn encode<T: Serialize>(
        event_type: impl Into<String>,
        key: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, key, serde_json::to_value(payload)?))
    }

    /// Replaces the production timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Decodes the payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Ping {
        order_id: i64,
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::random(), EventId::random());
    }

    #[test]
    fn encoded_payload_decodes_back() {
        let envelope = EventEnvelope::encode("Ping", "7", &Ping { order_id: 7 })
            .unwrap()
            .with_header("producer", "order-service");

        assert_eq!(envelope.event_type, "Ping");
        assert_eq!(envelope.key, "7");
        assert_eq!(envelope.payload, serde_json::json!({ "orderId": 7 }));
        assert_eq!(envelope.header("producer"), Some("order-service"));
        assert_eq!(envelope.header("missing"), None);
        assert_eq!(envelope.decode::<Ping>().unwrap(), Ping { order_id: 7 });
    }

    #[test]
    fn headers_are_omitted_when_empty() {
        let envelope = EventEnvelope::new("Ping", "1", serde_json::json!({}));
        let json = serde_json::to_value(&envelope).unwrap();

        assert!(json.get("headers").is_none());
        assert_eq!(json["eventType"], "Ping");
        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert!(back.headers.is_empty());
        assert_eq!(back.event_id, envelope.event_id);
    }
}
