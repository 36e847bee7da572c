//! Monetary amounts as fixed-point values.
//!
//! Amounts are stored in the smallest currency unit (centavos), never as
//! floating point. Two fraction digits are implied.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative monetary amount in centavos.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Amount from centavos (e.g. `from_cents(2050)` is R$ 20,50).
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Subtraction that refuses to go negative.
    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount underflow"))
    }

    /// Multiply by a quantity (line totals: quantity × unit price).
    pub fn checked_mul(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Saturating difference, for "remaining refundable" style derivations.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Saturating sum, for ledger accumulation inside `apply` (which cannot
    /// fail; `handle` has already bounds-checked the amounts).
    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Render as Brazilian currency: `R$ 1.234,56`.
    ///
    /// Thousands are grouped with `.`, the decimal separator is `,`.
    pub fn format_brl(&self) -> String {
        let reais = self.0 / 100;
        let centavos = self.0 % 100;

        let digits = reais.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        format!("R$ {grouped},{centavos:02}")
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format_brl())
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_small_amounts() {
        assert_eq!(Money::from_cents(0).format_brl(), "R$ 0,00");
        assert_eq!(Money::from_cents(5).format_brl(), "R$ 0,05");
        assert_eq!(Money::from_cents(2050).format_brl(), "R$ 20,50");
    }

    #[test]
    fn formats_with_thousands_grouping() {
        assert_eq!(Money::from_cents(123_456).format_brl(), "R$ 1.234,56");
        assert_eq!(Money::from_cents(100_000_000).format_brl(), "R$ 1.000.000,00");
    }

    #[test]
    fn checked_sub_refuses_negative_amounts() {
        let err = Money::from_cents(100)
            .checked_sub(Money::from_cents(200))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn line_total_is_quantity_times_unit_price() {
        let total = Money::from_cents(2000).checked_mul(3).unwrap();
        assert_eq!(total, Money::from_cents(6000));
    }

    #[test]
    fn sums_over_iterators() {
        let total: Money = [Money::from_cents(4000), Money::from_cents(6000)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(10_000));
    }
}
