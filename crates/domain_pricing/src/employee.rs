//! Employee context consumed by eligibility and discount rules
//!
//! The context is assembled by the caller from the employee registry and
//! the active insurance policy; the engine never loads it itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use core_kernel::{age_on, EmployeeId, InsuranceId};

use crate::condition::FilterType;
use crate::error::PricingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(PricingError::invalid_rule(format!("unknown gender '{}'", other))),
        }
    }
}

/// Relation of the insured person to the policyholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The employee holding the policy
    Policyholder,
    Spouse,
    Child,
    Parent,
    Other,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Policyholder => "policyholder",
            RelationType::Spouse => "spouse",
            RelationType::Child => "child",
            RelationType::Parent => "parent",
            RelationType::Other => "other",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policyholder" => Ok(RelationType::Policyholder),
            "spouse" => Ok(RelationType::Spouse),
            "child" => Ok(RelationType::Child),
            "parent" => Ok(RelationType::Parent),
            "other" => Ok(RelationType::Other),
            other => Err(PricingError::invalid_rule(format!("unknown relation type '{}'", other))),
        }
    }
}

/// Everything the rules need to know about the insured person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeContext {
    pub employee_id: EmployeeId,
    pub insurance_id: InsuranceId,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub relation: RelationType,
    pub province_code: Option<String>,
    pub location_code: Option<String>,
    /// Custom employee code (CEC) grouping employees for discounts and filters
    pub employee_code: Option<String>,
    pub special_type: Option<String>,
    pub illness_codes: BTreeSet<String>,
    /// Start date of the active insurance policy, for waiting periods
    pub policy_start_date: NaiveDate,
}

impl EmployeeContext {
    /// Age in whole years on the service date, if the birth date is known
    pub fn age_on(&self, service_date: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|birth| age_on(birth, service_date))
    }

    /// Days between policy start and the service date (negative if before)
    pub fn days_insured(&self, service_date: NaiveDate) -> i64 {
        (service_date - self.policy_start_date).num_days()
    }

    /// Values of the attribute a condition filter tests
    ///
    /// Single-valued attributes yield zero or one value; illnesses may yield many.
    pub fn attribute_values(&self, filter_type: FilterType) -> Vec<&str> {
        match filter_type {
            FilterType::Province => self.province_code.as_deref().into_iter().collect(),
            FilterType::Location => self.location_code.as_deref().into_iter().collect(),
            FilterType::EmployeeCode => self.employee_code.as_deref().into_iter().collect(),
            FilterType::SpecialType => self.special_type.as_deref().into_iter().collect(),
            FilterType::Illness => self.illness_codes.iter().map(String::as_str).collect(),
        }
    }
}
