//! Shared monetary types
//!
//! Balances, wagers and payouts are fixed-point integers so that ledger
//! arithmetic is exact. Floating point only appears at the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Micro-units per major currency unit (1.000000)
pub const AMOUNT_SCALE: u64 = 1_000_000;

/// Hundredths per whole multiplier (1.00x)
pub const MULTIPLIER_SCALE: u32 = 100;

/// Non-negative monetary amount in micro-units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Whole major units, e.g. `Amount::from_major_units(10)` is 10.00
    pub const fn from_major_units(major: u64) -> Self {
        Self(major * AMOUNT_SCALE)
    }

    /// Convert a decimal major-unit value, rounding to the nearest micro-unit.
    /// Returns `None` for negative, non-finite or out-of-range values.
    pub fn from_major(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let units = (value * AMOUNT_SCALE as f64).round();
        if units > u64::MAX as f64 {
            return None;
        }
        Some(Self(units as u64))
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub fn to_major(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `self / divisor * multiplier`, floored to the micro-unit. `None` when
    /// the result does not fit.
    ///
    /// The product is taken before the division so that a split bet does not
    /// lose precision twice.
    pub fn split_and_multiply(self, divisor: u64, multiplier: Multiplier) -> Option<Amount> {
        if divisor == 0 {
            return Some(Amount::ZERO);
        }
        let numerator = self.0 as u128 * multiplier.hundredths() as u128;
        let denominator = divisor as u128 * MULTIPLIER_SCALE as u128;
        u64::try_from(numerator / denominator).ok().map(Amount)
    }

    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / AMOUNT_SCALE;
        let cents = (self.0 % AMOUNT_SCALE) / (AMOUNT_SCALE / 100);
        write!(f, "{}.{:02}", whole, cents)
    }
}

/// Paytable multiplier with two decimal places
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Multiplier(u32);

impl Multiplier {
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MULTIPLIER_SCALE as f64
    }
}

impl TryFrom<f64> for Multiplier {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("multiplier must be a non-negative number, got {}", value));
        }
        let hundredths = (value * MULTIPLIER_SCALE as f64).round();
        if hundredths > u32::MAX as f64 {
            return Err(format!("multiplier {} is too large", value));
        }
        Ok(Self(hundredths as u32))
    }
}

impl From<Multiplier> for f64 {
    fn from(m: Multiplier) -> f64 {
        m.as_f64()
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / MULTIPLIER_SCALE, self.0 % MULTIPLIER_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_conversion() {
        assert_eq!(Amount::from_major(10.0), Some(Amount::from_major_units(10)));
        assert_eq!(Amount::from_major(0.25).unwrap().units(), 250_000);
        assert_eq!(Amount::from_major(-1.0), None);
        assert_eq!(Amount::from_major(f64::NAN), None);
        assert_eq!(Amount::from_major_units(5).to_major(), 5.0);
    }

    #[test]
    fn test_split_and_multiply() {
        // 10.00 over 5 lines at 5.00x
        let win = Amount::from_major_units(10).split_and_multiply(5, Multiplier::from_hundredths(500));
        assert_eq!(win, Some(Amount::from_major_units(10)));

        // Floors rather than rounds: 1.00 / 3 * 1.00
        let win = Amount::from_major_units(1).split_and_multiply(3, Multiplier::from_hundredths(100));
        assert_eq!(win.map(Amount::units), Some(333_333));

        assert_eq!(Amount::from_major_units(1).split_and_multiply(0, Multiplier::from_hundredths(100)), Some(Amount::ZERO));

        // Too large for u64 micro-units
        let huge = Amount::from_units(u64::MAX / 2);
        assert_eq!(huge.split_and_multiply(1, Multiplier::from_hundredths(500)), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        let five = Amount::from_major_units(5);
        let ten = Amount::from_major_units(10);
        assert_eq!(five.checked_sub(ten), None);
        assert_eq!(ten.checked_sub(five), Some(five));
        assert_eq!(Amount::from_units(u64::MAX).checked_add(five), None);

        assert_eq!(Amount::checked_sum([five, ten]), Some(Amount::from_major_units(15)));
        assert_eq!(Amount::checked_sum([]), Some(Amount::ZERO));
        assert_eq!(Amount::checked_sum([Amount::from_units(u64::MAX), five]), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_units(12_345_678).to_string(), "12.34");
        assert_eq!(Multiplier::from_hundredths(250).to_string(), "2.50x");
        assert_eq!(Multiplier::try_from(5.0).unwrap(), Multiplier::from_hundredths(500));
        assert!(Multiplier::try_from(-0.5).is_err());
    }
}
