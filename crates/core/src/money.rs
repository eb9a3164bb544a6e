//! Money as integral minor units.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Amount of money in the smallest currency unit (e.g., cents).
///
/// Totals are recomputed from line items, so arithmetic is checked and never
/// silently wraps.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g., `from_major(100)` is 100.00).
    pub const fn from_major(units: u64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Whole units, truncated (`12.99` → `12`).
    pub const fn whole_units(self) -> u64 {
        self.0 / 100
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Divide and round half-up to the nearest cent. Dividing by zero yields zero.
    pub fn div_rounded(self, divisor: u64) -> Money {
        if divisor == 0 {
            return Money::ZERO;
        }
        let q = self.0 / divisor;
        let r = self.0 % divisor;
        if r * 2 >= divisor { Money(q + 1) } else { Money(q) }
    }

    /// Scale by `numerator / denominator`, rounding half-up.
    pub fn scale(self, numerator: u64, denominator: u64) -> Money {
        if denominator == 0 {
            return Money::ZERO;
        }
        let scaled = (self.0 as u128) * (numerator as u128);
        let den = denominator as u128;
        let q = scaled / den;
        let r = scaled % den;
        let rounded = if r * 2 >= den { q + 1 } else { q };
        Money(u64::try_from(rounded).unwrap_or(u64::MAX))
    }

    /// Price after taking `percent`% off (clamped to 100%).
    pub fn percent_off(self, percent: u8) -> Money {
        let percent = u64::from(percent.min(100));
        self.scale(100 - percent, 100)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}
