//! Money and percentage types with precise decimal arithmetic
//!
//! The engine works in a single monetary unit, so `Money` is a thin
//! newtype over `rust_decimal::Decimal` without a currency tag. Amounts are
//! kept at 4 decimal places internally; shares written to invoice rows are
//! rounded to the settlement scale with [`Money::round_to_scale`].

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use thiserror::Error;

/// Internal precision for intermediate amounts
const INTERNAL_SCALE: u32 = 4;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Percentage out of range: {0} (expected 0..=100)")]
    PercentageOutOfRange(Decimal),

    #[error("Division by zero")]
    DivisionByZero,
}

/// A monetary amount in the engine's single settlement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a new amount, normalised to the internal scale
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(INTERNAL_SCALE))
    }

    /// Creates an amount, rejecting negative values
    pub fn non_negative(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::InvalidAmount(format!(
                "amount must not be negative, got {}",
                amount
            )));
        }
        Ok(Self::new(amount))
    }

    /// The zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Rounds to `dp` decimal places, midpoint away from zero
    pub fn round_to_scale(&self, dp: u32) -> Self {
        Self(self.0.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Multiplies by a scalar (e.g. a quantity)
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    /// Divides by a scalar
    pub fn divide(&self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Self::new(self.0 / divisor))
    }

    /// Subtracts, flooring the result at zero
    pub fn saturating_sub(&self, other: Money) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Clamps negative amounts to zero
    pub fn floor_zero(&self) -> Self {
        if self.is_negative() {
            Self::zero()
        } else {
            *self
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, factor: Decimal) -> Self {
        self.multiply(factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

/// A percentage in the closed range 0..=100 (e.g. 80 for 80%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);
    pub const FULL: Percentage = Percentage(Decimal::ONE_HUNDRED);

    /// Creates a percentage, validating the 0..=100 range
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(MoneyError::PercentageOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Creates a percentage, clamping into 0..=100
    pub fn clamped(value: Decimal) -> Self {
        Self(value.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED))
    }

    /// Returns the value as a percentage (80 for 80%)
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the value as a fraction (0.8 for 80%)
    pub fn as_fraction(&self) -> Decimal {
        self.0 / dec!(100)
    }

    /// Returns `100 - self`
    pub fn complement(&self) -> Self {
        Self(Decimal::ONE_HUNDRED - self.0)
    }

    /// Applies this percentage to an amount
    pub fn apply(&self, money: Money) -> Money {
        money.multiply(self.as_fraction())
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_internal_scale() {
        let m = Money::new(dec!(100.123456));
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Money::new(dec!(100));
        let b = Money::new(dec!(250));
        assert_eq!(a.saturating_sub(b), Money::zero());
        assert_eq!(b.saturating_sub(a).amount(), dec!(150));
    }

    #[test]
    fn test_percentage_rejects_out_of_range() {
        assert!(Percentage::new(dec!(101)).is_err());
        assert!(Percentage::new(dec!(-1)).is_err());
        assert!(Percentage::new(dec!(100)).is_ok());
    }

    #[test]
    fn test_percentage_apply() {
        let p = Percentage::new(dec!(80)).unwrap();
        let base = Money::new(dec!(1000000));
        assert_eq!(p.apply(base).amount(), dec!(800000));
        assert_eq!(p.complement().value(), dec!(20));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn percentage_and_complement_partition_amount(
            amount in 0i64..10_000_000_000i64,
            pct in 0u32..=100u32
        ) {
            let money = Money::new(Decimal::new(amount, 2));
            let p = Percentage::new(Decimal::from(pct)).unwrap();
            let insurer = p.apply(money).round_to_scale(2);
            let patient = money - insurer;
            prop_assert_eq!(insurer + patient, money);
            prop_assert!(!patient.is_negative());
        }

        #[test]
        fn money_addition_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::new(Decimal::new(a, 2));
            let mb = Money::new(Decimal::new(b, 2));
            let mc = Money::new(Decimal::new(c, 2));

            prop_assert_eq!((ma + mb) + mc, ma + (mb + mc));
        }
    }
}
