//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, shares and invoice shapes the engine
//! must handle without breaking its balance invariants.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{ItemId, Money, Percentage};

use crate::fixtures::Dates;

/// Unit prices from 1.00 to 10,000,000.00
pub fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

pub fn money_strategy() -> impl Strategy<Value = Money> {
    unit_price_strategy().prop_map(Money::new)
}

/// Whole and fractional percentages, 0.00 to 100.00
pub fn percentage_strategy() -> impl Strategy<Value = Percentage> {
    (0u32..=10000u32).prop_map(|n| Percentage::clamped(Decimal::new(n as i64, 2)))
}

/// Complementary insurer/patient shares summing to 100
pub fn share_split_strategy() -> impl Strategy<Value = (Percentage, Percentage)> {
    percentage_strategy().prop_map(|insurer| (insurer, insurer.complement()))
}

pub fn quantity_strategy() -> impl Strategy<Value = u32> {
    1u32..20u32
}

/// Annual ceilings from zero up to 50,000,000
pub fn ceiling_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..50_000_000i64).prop_map(Decimal::from)
}

pub fn item_id_strategy() -> impl Strategy<Value = ItemId> {
    any::<[u8; 16]>().prop_map(|bytes| ItemId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Service dates inside the fixture policy year
pub fn service_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..366i64).prop_map(|days| Dates::policy_start() + Duration::days(days))
}

pub fn age_strategy() -> impl Strategy<Value = u32> {
    0u32..100u32
}

/// Illness and diagnosis codes shaped like ICD-10 categories
pub fn diagnosis_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z][0-9]{2}(\\.[0-9])?".prop_map(|s| s)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn share_split_sums_to_full(split in share_split_strategy()) {
            prop_assert_eq!(split.0.value() + split.1.value(), Decimal::ONE_HUNDRED);
        }

        #[test]
        fn service_dates_fall_in_policy_year(date in service_date_strategy()) {
            prop_assert!(date >= Dates::policy_start());
            prop_assert!(date <= Dates::policy_end());
        }

        #[test]
        fn unit_prices_are_positive(price in money_strategy()) {
            prop_assert!(price.is_positive());
        }
    }
}
