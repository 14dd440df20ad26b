//! Pricing conditions
//!
//! An `ItemPriceCondition` overrides the tariff's default insurer/patient
//! split for items in its scope, subject to eligibility bounds, attached
//! filters (all must pass), and restrictions (any violation disqualifies).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    is_in_force, ConditionFilterId, ConditionId, EffectivePeriod, ItemId, Lifecycle, Money,
    Percentage, PeriodType, RestrictionId,
};

use crate::catalog::ItemSelector;
use crate::employee::{Gender, RelationType};
use crate::error::PricingError;

/// Employee attribute a filter tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Province,
    Location,
    EmployeeCode,
    SpecialType,
    Illness,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Province => "province",
            FilterType::Location => "location",
            FilterType::EmployeeCode => "employee_code",
            FilterType::SpecialType => "special_type",
            FilterType::Illness => "illness",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "province" => Ok(FilterType::Province),
            "location" => Ok(FilterType::Location),
            "employee_code" => Ok(FilterType::EmployeeCode),
            "special_type" => Ok(FilterType::SpecialType),
            "illness" => Ok(FilterType::Illness),
            other => Err(PricingError::invalid_rule(format!("unknown filter type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    In,
    NotIn,
    Equals,
    NotEquals,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
        }
    }

    fn is_positive(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::Equals)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(FilterOperator::In),
            "not_in" => Ok(FilterOperator::NotIn),
            "equals" => Ok(FilterOperator::Equals),
            "not_equals" => Ok(FilterOperator::NotEquals),
            other => Err(PricingError::invalid_rule(format!("unknown filter operator '{}'", other))),
        }
    }
}

/// Eligibility predicate attached to a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFilter {
    pub id: ConditionFilterId,
    pub filter_type: FilterType,
    pub operator: FilterOperator,
    pub values: BTreeSet<String>,
}

impl ConditionFilter {
    /// Applies the operator to the employee's attribute values
    ///
    /// `in`/`equals` pass when any attribute value is in the set, so an
    /// absent attribute fails them; `not_in`/`not_equals` pass when none is.
    pub fn passes(&self, attribute_values: &[&str]) -> bool {
        let hit = attribute_values.iter().any(|v| self.values.contains(*v));
        if self.operator.is_positive() {
            hit
        } else {
            !hit
        }
    }
}

/// Post-eligibility constraint attached to a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestrictionKind {
    /// The item must not be claimed together with `item_id`: on the same
    /// invoice, or when `within` is set, anywhere in that period
    ConflictItem {
        item_id: ItemId,
        within: Option<PeriodType>,
    },
    /// At most `max_count` covered uses per body part in the period
    MaxPerBodyPart {
        max_count: u32,
        period: PeriodType,
    },
    /// At most `max_count` covered uses of the condition in the period
    MaxCount {
        max_count: u32,
        period: PeriodType,
    },
    /// At most `max_quantity` covered units of the condition in the period
    MaxQuantity {
        max_quantity: u32,
        period: PeriodType,
    },
    /// One of the codes must be among the employee's diagnoses
    RequiredDiagnosis {
        codes: BTreeSet<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRestriction {
    pub id: RestrictionId,
    pub kind: RestrictionKind,
}

/// A scoped, prioritised coverage rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPriceCondition {
    pub id: ConditionId,
    pub name: String,
    pub scope: ItemSelector,
    /// Insurer share of the covered base
    pub coverage: Percentage,
    /// When set, the patient pays exactly this share and `coverage` is ignored
    pub patient_share_override: Option<Percentage>,
    /// Insurer share cap per invoice line
    pub max_covered_amount: Option<Money>,
    /// Covered units per invoice line
    pub max_quantity: Option<u32>,
    pub requires_pre_approval: bool,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub gender: Option<Gender>,
    pub relation: Option<RelationType>,
    pub waiting_days: Option<u32>,
    /// Higher wins
    pub priority: i32,
    pub period: EffectivePeriod,
    pub lifecycle: Lifecycle,
    pub filters: Vec<ConditionFilter>,
    pub restrictions: Vec<ConditionRestriction>,
}

impl ItemPriceCondition {
    pub fn is_in_force(&self, as_of: NaiveDate) -> bool {
        is_in_force(self.lifecycle, &self.period, as_of)
    }

    /// Insurer percentage after applying the patient-share override
    pub fn effective_coverage(&self) -> Percentage {
        match self.patient_share_override {
            Some(patient) => patient.complement(),
            None => self.coverage,
        }
    }

    /// Checks the definition is internally consistent
    pub fn validate(&self) -> Result<(), PricingError> {
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(PricingError::invalid_rule(format!(
                    "condition {} has min_age {} above max_age {}",
                    self.id, min, max
                )));
            }
        }
        if self.max_quantity == Some(0) {
            return Err(PricingError::invalid_rule(format!(
                "condition {} has a zero max_quantity",
                self.id
            )));
        }
        if self.max_covered_amount.map_or(false, |m| m.is_negative()) {
            return Err(PricingError::invalid_rule(format!(
                "condition {} has a negative max_covered_amount",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(operator: FilterOperator, values: &[&str]) -> ConditionFilter {
        ConditionFilter {
            id: ConditionFilterId::new(),
            filter_type: FilterType::Province,
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_in_filter() {
        let f = filter(FilterOperator::In, &["TEH", "ISF"]);
        assert!(f.passes(&["TEH"]));
        assert!(!f.passes(&["SHZ"]));
        assert!(!f.passes(&[]));
    }

    #[test]
    fn test_not_in_filter_passes_on_missing_attribute() {
        let f = filter(FilterOperator::NotIn, &["TEH"]);
        assert!(f.passes(&[]));
        assert!(f.passes(&["ISF"]));
        assert!(!f.passes(&["TEH"]));
    }

    #[test]
    fn test_equals_on_multi_valued_attribute() {
        let f = filter(FilterOperator::Equals, &["E11"]);
        assert!(f.passes(&["I10", "E11"]));
        let f = filter(FilterOperator::NotEquals, &["E11"]);
        assert!(!f.passes(&["I10", "E11"]));
    }

    #[test]
    fn test_restriction_kind_serde_tag() {
        let kind = RestrictionKind::MaxCount { max_count: 2, period: PeriodType::Monthly };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "max_count");
        assert_eq!(json["period"], "monthly");
    }
}
