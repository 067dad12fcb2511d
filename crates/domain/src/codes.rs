//! Failure codes and channel types carried in event payloads.

use serde::{Deserialize, Serialize};

/// Why inventory could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryFailureCode {
    InsufficientStock,
    SystemError,
}

/// Why a payment did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFailureCode {
    /// The gateway answered and declined.
    GatewayError,
    /// The gateway could not be reached, timed out or failed internally.
    SystemError,
}

/// Why an order ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderFailureCode {
    PaymentFailed,
    InventoryUnavailable,
}

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Email,
    Sms,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "EMAIL",
            ChannelType::Sms => "SMS",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_contract_spelling() {
        assert_eq!(
            serde_json::to_string(&InventoryFailureCode::InsufficientStock).unwrap(),
            "\"INSUFFICIENT_STOCK\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentFailureCode::GatewayError).unwrap(),
            "\"GATEWAY_ERROR\""
        );
        assert_eq!(
            serde_json::to_string(&OrderFailureCode::InventoryUnavailable).unwrap(),
            "\"INVENTORY_UNAVAILABLE\""
        );
    }

    #[test]
    fn channel_type_display_matches_wire_form() {
        let json = serde_json::to_string(&ChannelType::Email).unwrap();
        assert_eq!(json, format!("\"{}\"", ChannelType::Email));
    }
}
