//! Row value decoding shared by the adapters

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{CategoryId, EffectivePeriod, ItemId, Percentage, PortError, SubCategoryId};
use domain_pricing::ItemSelector;

use crate::error::DatabaseError;

/// Parses a text column through the domain type's `FromStr`
pub(crate) fn parse<T>(column: &str, value: &str) -> Result<T, PortError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| DatabaseError::decode(column, e).into())
}

pub(crate) fn parse_opt<T>(column: &str, value: Option<&str>) -> Result<Option<T>, PortError>
where
    T: FromStr,
    T::Err: Display,
{
    value.map(|v| parse(column, v)).transpose()
}

pub(crate) fn percentage(column: &str, value: Decimal) -> Result<Percentage, PortError> {
    Percentage::new(value).map_err(|e| DatabaseError::decode(column, e).into())
}

pub(crate) fn count(column: &str, value: i32) -> Result<u32, PortError> {
    u32::try_from(value).map_err(|e| DatabaseError::decode(column, e).into())
}

pub(crate) fn count_opt(column: &str, value: Option<i32>) -> Result<Option<u32>, PortError> {
    value.map(|v| count(column, v)).transpose()
}

pub(crate) fn period(from: NaiveDate, to: Option<NaiveDate>) -> Result<EffectivePeriod, PortError> {
    EffectivePeriod::new(from, to).map_err(|e| DatabaseError::decode("effective_to", e).into())
}

pub(crate) fn selector(scope_type: &str, scope_id: Uuid) -> Result<ItemSelector, PortError> {
    match scope_type {
        "item" => Ok(ItemSelector::Item(ItemId::from(scope_id))),
        "sub_category" => Ok(ItemSelector::SubCategory(SubCategoryId::from(scope_id))),
        "category" => Ok(ItemSelector::Category(CategoryId::from(scope_id))),
        other => Err(DatabaseError::decode("scope_type", format!("unknown scope '{}'", other)).into()),
    }
}

/// Decodes a JSONB column holding a serde-tagged domain value
pub(crate) fn json<T: serde::de::DeserializeOwned>(column: &str, value: serde_json::Value) -> Result<T, PortError> {
    serde_json::from_value(value).map_err(|e| DatabaseError::decode(column, e).into())
}

pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<serde_json::Value, PortError> {
    serde_json::to_value(value).map_err(|e| DatabaseError::decode(column, e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Lifecycle, PeriodType};

    #[test]
    fn test_parse_domain_enums() {
        assert_eq!(parse::<Lifecycle>("lifecycle", "active").unwrap(), Lifecycle::Active);
        assert_eq!(parse::<PeriodType>("period_type", "weekly").unwrap(), PeriodType::Weekly);
        assert!(parse::<PeriodType>("period_type", "fortnightly").is_err());
    }

    #[test]
    fn test_negative_count_is_rejected() {
        assert!(count("max_quantity", -1).is_err());
        assert_eq!(count_opt("max_quantity", Some(3)).unwrap(), Some(3));
    }

    #[test]
    fn test_selector_scopes() {
        let id = Uuid::now_v7();
        assert_eq!(selector("item", id).unwrap(), ItemSelector::Item(ItemId::from(id)));
        assert!(selector("group", id).is_err());
    }
}
