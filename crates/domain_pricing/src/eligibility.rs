//! Eligibility evaluation for pricing conditions
//!
//! Checks run in a fixed order: age, gender, relation, waiting period, then
//! each attached filter in declaration order. Adjudication uses the
//! short-circuit path; admin diagnostics collect every failure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::{FilterOperator, FilterType, ItemPriceCondition};
use crate::employee::{EmployeeContext, Gender, RelationType};

/// A single failed eligibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum EligibilityFailure {
    /// The condition has age bounds but the birth date is unknown
    AgeUnknown,
    AgeBelowMinimum { age: u32, min: u32 },
    AgeAboveMaximum { age: u32, max: u32 },
    GenderMismatch { required: Gender, actual: Option<Gender> },
    RelationMismatch { required: RelationType, actual: RelationType },
    WaitingPeriod { required_days: u32, elapsed_days: i64 },
    FilterRejected { filter_type: FilterType, operator: FilterOperator },
}

impl fmt::Display for EligibilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityFailure::AgeUnknown => write!(f, "age is required but birth date is unknown"),
            EligibilityFailure::AgeBelowMinimum { age, min } => {
                write!(f, "age {} is below minimum {}", age, min)
            }
            EligibilityFailure::AgeAboveMaximum { age, max } => {
                write!(f, "age {} is above maximum {}", age, max)
            }
            EligibilityFailure::GenderMismatch { required, actual } => match actual {
                Some(actual) => write!(f, "gender {} does not match required {}", actual, required),
                None => write!(f, "gender is unknown, {} required", required),
            },
            EligibilityFailure::RelationMismatch { required, actual } => {
                write!(f, "relation {} does not match required {}", actual, required)
            }
            EligibilityFailure::WaitingPeriod { required_days, elapsed_days } => write!(
                f,
                "waiting period of {} days not served ({} elapsed)",
                required_days, elapsed_days
            ),
            EligibilityFailure::FilterRejected { filter_type, operator } => {
                write!(f, "{} filter ({}) rejected the employee", filter_type, operator)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Stop at the first failure
    ShortCircuit,
    /// Collect every failure
    Exhaustive,
}

/// Outcome of evaluating every eligibility check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub failures: Vec<EligibilityFailure>,
}

impl EligibilityReport {
    pub fn is_eligible(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decides whether a condition applies to an employee on a service date
pub struct EligibilityFilter;

impl EligibilityFilter {
    /// Short-circuiting check used during adjudication
    pub fn check(
        condition: &ItemPriceCondition,
        employee: &EmployeeContext,
        service_date: NaiveDate,
    ) -> Result<(), EligibilityFailure> {
        match Self::evaluate(condition, employee, service_date, EvaluationMode::ShortCircuit)
            .failures
            .into_iter()
            .next()
        {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Runs every check and reports all failures
    pub fn evaluate_all(
        condition: &ItemPriceCondition,
        employee: &EmployeeContext,
        service_date: NaiveDate,
    ) -> EligibilityReport {
        Self::evaluate(condition, employee, service_date, EvaluationMode::Exhaustive)
    }

    pub fn evaluate(
        condition: &ItemPriceCondition,
        employee: &EmployeeContext,
        service_date: NaiveDate,
        mode: EvaluationMode,
    ) -> EligibilityReport {
        let mut report = EligibilityReport::default();
        let fail = |failure: EligibilityFailure, report: &mut EligibilityReport| {
            report.failures.push(failure);
            mode == EvaluationMode::ShortCircuit
        };

        if condition.min_age.is_some() || condition.max_age.is_some() {
            match employee.age_on(service_date) {
                None => {
                    if fail(EligibilityFailure::AgeUnknown, &mut report) {
                        return report;
                    }
                }
                Some(age) => {
                    if let Some(min) = condition.min_age.filter(|min| age < *min) {
                        if fail(EligibilityFailure::AgeBelowMinimum { age, min }, &mut report) {
                            return report;
                        }
                    }
                    if let Some(max) = condition.max_age.filter(|max| age > *max) {
                        if fail(EligibilityFailure::AgeAboveMaximum { age, max }, &mut report) {
                            return report;
                        }
                    }
                }
            }
        }

        if let Some(required) = condition.gender {
            if employee.gender != Some(required) {
                let failure = EligibilityFailure::GenderMismatch { required, actual: employee.gender };
                if fail(failure, &mut report) {
                    return report;
                }
            }
        }

        if let Some(required) = condition.relation {
            if employee.relation != required {
                let failure = EligibilityFailure::RelationMismatch { required, actual: employee.relation };
                if fail(failure, &mut report) {
                    return report;
                }
            }
        }

        if let Some(required_days) = condition.waiting_days {
            let elapsed_days = employee.days_insured(service_date);
            if elapsed_days < i64::from(required_days) {
                let failure = EligibilityFailure::WaitingPeriod { required_days, elapsed_days };
                if fail(failure, &mut report) {
                    return report;
                }
            }
        }

        for filter in &condition.filters {
            if !filter.passes(&employee.attribute_values(filter.filter_type)) {
                let failure = EligibilityFailure::FilterRejected {
                    filter_type: filter.filter_type,
                    operator: filter.operator,
                };
                if fail(failure, &mut report) {
                    return report;
                }
            }
        }

        report
    }
}
