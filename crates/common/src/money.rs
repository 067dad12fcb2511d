//! Monetary amounts.

use serde::{Deserialize, Serialize};

/// An amount in integer cents, serialized as a bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Price of `quantity` units, or `None` if it does not fit in an `i64`.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Adds up `amounts`, stopping at the first overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Share of this amount in basis points (1000 = 10%), rounded half away
    /// from zero to the cent.
    pub fn percentage_bps(&self, bps: u32) -> Option<Money> {
        let scaled = i128::from(self.0) * i128::from(bps);
        let half = 5_000 * scaled.signum();
        i64::try_from((scaled + half) / 10_000).ok().map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_dollars() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn line_totals_add_up() {
        let line = Money::from_cents(1000).checked_mul(2).unwrap();
        let total = Money::checked_sum([line, Money::from_cents(250)]).unwrap();
        assert_eq!(total.cents(), 2250);
    }

    #[test]
    fn overflow_yields_none() {
        let big = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(big.checked_mul(2), None);
        assert_eq!(big.checked_add(big), None);
        assert_eq!(Money::checked_sum([big, big, Money::from_cents(-5)]), None);
        assert_eq!(Money::from_cents(i64::MAX).percentage_bps(20_000), None);
        assert_eq!(
            Money::from_cents(i64::MAX).percentage_bps(1000),
            Some(Money::from_cents(922_337_203_685_477_581))
        );
    }

    #[test]
    fn percentage_rounds_half_up() {
        let tax = |cents: i64, bps: u32| Money::from_cents(cents).percentage_bps(bps).unwrap().cents();
        assert_eq!(tax(10_000, 1000), 1000);
        // 10% of $0.05 is half a cent
        assert_eq!(tax(5, 1000), 1);
        assert_eq!(tax(4, 1000), 0);
        assert_eq!(tax(1999, 825), 165);
        assert_eq!(tax(-5, 1000), -1);
    }

    #[test]
    fn serializes_as_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(999)).unwrap(), "999");
        let back: Money = serde_json::from_str("250").unwrap();
        assert_eq!(back, Money::from_cents(250));
    }
}
