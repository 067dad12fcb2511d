//! Line items as they travel inside events.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// An ordered product, priced at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price), or
    /// `None` if it overflows.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Sum of all line totals, or `None` if any step overflows.
pub fn order_total(items: &[LineItem]) -> Option<Money> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        acc.checked_add(item.total_price()?)
    })
}

/// A product quantity held for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_total_price() {
        let item = LineItem::new(1, 3, Money::from_cents(1000));
        assert_eq!(item.total_price(), Some(Money::from_cents(3000)));
    }

    #[test]
    fn order_total_detects_overflow() {
        let items = [
            LineItem::new(1, 2, Money::from_cents(150)),
            LineItem::new(2, 1, Money::from_cents(99)),
        ];
        assert_eq!(order_total(&items), Some(Money::from_cents(399)));

        let huge = LineItem::new(1, 2, Money::from_cents(i64::MAX / 2 + 1));
        assert_eq!(huge.total_price(), None);
        assert_eq!(order_total(&[huge]), None);
    }

    #[test]
    fn line_item_uses_camel_case_fields() {
        let json = serde_json::to_value(LineItem::new(5, 2, Money::from_cents(250))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"productId": 5, "quantity": 2, "unitPrice": 250})
        );
    }
}
