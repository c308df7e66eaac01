use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A monetary amount in minor units (cents).
///
/// Prices reach us as decimal floats from the product authority. They are
/// converted once, at the boundary, and every sum after that is exact integer
/// arithmetic, so `9.99 × 2` is `19.98` and not `19.979999...`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Converts a decimal amount, rounding half away from zero to the cent.
    ///
    /// Returns `None` for NaN, infinities, negative amounts and values that do
    /// not fit.
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        // i64::MAX as f64 rounds up to 2^63, which does not fit.
        if cents >= i64::MAX as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }

    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
