//! Integer identifier newtypes.

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }
    };
}

integer_id!(
    /// Identifier of an order, owned by the order participant.
    ///
    /// Its string form is the partition key of every saga event.
    OrderId
);

integer_id!(
    /// Identifier of the user who placed an order.
    UserId
);

integer_id!(
    /// Identifier of a catalog product.
    ProductId
);

integer_id!(
    /// Identifier of a payment record.
    PaymentId
);

integer_id!(
    /// Identifier of an invoice.
    InvoiceId
);

integer_id!(
    /// Identifier of a notification record.
    NotificationId
);
