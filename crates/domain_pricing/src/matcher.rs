//! Condition selection
//!
//! Candidates are the in-force conditions whose scope matches the item,
//! ordered by priority (higher first), scope specificity (item, then
//! sub-category, then category), most recent `effective_from`, and finally
//! condition id so the order is total. The first candidate that passes
//! eligibility and every restriction is applied.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use tracing::debug;

use core_kernel::ConditionId;

use crate::catalog::ItemClassification;
use crate::condition::ItemPriceCondition;
use crate::eligibility::{EligibilityFailure, EligibilityFilter};
use crate::employee::EmployeeContext;
use crate::restriction::{RestrictionChecker, RestrictionContext, RestrictionViolation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    Ineligible(EligibilityFailure),
    Restricted(RestrictionViolation),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Ineligible(failure) => write!(f, "not eligible: {}", failure),
            RejectionReason::Restricted(violation) => write!(f, "restricted: {}", violation),
        }
    }
}

/// A candidate that was considered and skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCondition {
    pub condition_id: ConditionId,
    pub condition_name: String,
    pub reason: RejectionReason,
}

/// Result of condition selection for one line
#[derive(Debug, Clone)]
pub struct ConditionMatch<'a> {
    pub selected: Option<&'a ItemPriceCondition>,
    /// Skipped candidates in evaluation order
    pub rejected: Vec<RejectedCondition>,
}

impl ConditionMatch<'_> {
    /// The last restriction violation among skipped candidates, if any
    pub fn last_violation(&self) -> Option<&RestrictionViolation> {
        self.rejected.iter().rev().find_map(|r| match &r.reason {
            RejectionReason::Restricted(v) => Some(v),
            RejectionReason::Ineligible(_) => None,
        })
    }
}

pub struct ConditionMatcher;

impl ConditionMatcher {
    /// In-force, scope-matching conditions in evaluation order
    pub fn candidates<'a>(
        conditions: &'a [ItemPriceCondition],
        item: &ItemClassification,
        as_of: NaiveDate,
    ) -> Vec<&'a ItemPriceCondition> {
        let mut candidates: Vec<&ItemPriceCondition> = conditions
            .iter()
            .filter(|c| c.is_in_force(as_of) && c.scope.matches(item))
            .collect();
        candidates.sort_by_key(|c| {
            (
                Reverse(c.priority),
                Reverse(c.scope.specificity()),
                Reverse(c.period.from),
                c.id,
            )
        });
        candidates
    }

    /// Selects the condition to apply to a line
    pub fn select<'a>(
        conditions: &'a [ItemPriceCondition],
        item: &ItemClassification,
        employee: &EmployeeContext,
        restrictions: &RestrictionContext<'_>,
    ) -> ConditionMatch<'a> {
        let service_date = restrictions.service_date;
        let mut rejected = Vec::new();

        for condition in Self::candidates(conditions, item, service_date) {
            let outcome = EligibilityFilter::check(condition, employee, service_date)
                .map_err(RejectionReason::Ineligible)
                .and_then(|()| {
                    RestrictionChecker::check(condition, restrictions).map_err(RejectionReason::Restricted)
                });

            match outcome {
                Ok(()) => {
                    debug!(condition_id = %condition.id, item_id = %item.item_id, "condition selected");
                    return ConditionMatch { selected: Some(condition), rejected };
                }
                Err(reason) => {
                    debug!(
                        condition_id = %condition.id,
                        item_id = %item.item_id,
                        %reason,
                        "condition skipped"
                    );
                    rejected.push(RejectedCondition {
                        condition_id: condition.id,
                        condition_name: condition.name.clone(),
                        reason,
                    });
                }
            }
        }

        ConditionMatch { selected: None, rejected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemSelector;
    use crate::employee::RelationType;
    use crate::usage::UsageHistory;
    use core_kernel::{
        CategoryId, EffectivePeriod, EmployeeId, InsuranceId, ItemId, Lifecycle, Percentage,
        SubCategoryId,
    };
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item() -> ItemClassification {
        ItemClassification {
            item_id: ItemId::new(),
            category_id: CategoryId::new(),
            sub_category_id: Some(SubCategoryId::new()),
            group_id: None,
        }
    }

    fn condition(scope: ItemSelector, priority: i32, from: NaiveDate, coverage: i64) -> ItemPriceCondition {
        ItemPriceCondition {
            id: ConditionId::new(),
            name: format!("{} p{}", scope, priority),
            scope,
            coverage: Percentage::new(Decimal::from(coverage)).unwrap(),
            patient_share_override: None,
            max_covered_amount: None,
            max_quantity: None,
            requires_pre_approval: false,
            min_age: None,
            max_age: None,
            gender: None,
            relation: None,
            waiting_days: None,
            priority,
            period: EffectivePeriod::starting(from),
            lifecycle: Lifecycle::Active,
            filters: vec![],
            restrictions: vec![],
        }
    }

    fn employee() -> EmployeeContext {
        EmployeeContext {
            employee_id: EmployeeId::new(),
            insurance_id: InsuranceId::new(),
            birth_date: Some(date(1954, 1, 1)),
            gender: None,
            relation: RelationType::Policyholder,
            province_code: None,
            location_code: None,
            employee_code: None,
            special_type: None,
            illness_codes: BTreeSet::new(),
            policy_start_date: date(2020, 1, 1),
        }
    }

    fn select<'a>(conditions: &'a [ItemPriceCondition], item: &ItemClassification) -> ConditionMatch<'a> {
        let history = UsageHistory::default();
        let diagnoses = BTreeSet::new();
        let ctx = RestrictionContext {
            history: &history,
            other_invoice_items: &[],
            body_part_id: None,
            quantity: 1,
            diagnoses: &diagnoses,
            service_date: date(2024, 6, 1),
        };
        ConditionMatcher::select(conditions, item, &employee(), &ctx)
    }

    #[test]
    fn test_priority_beats_specificity() {
        let item = item();
        let conditions = vec![
            condition(ItemSelector::Item(item.item_id), 1, date(2024, 1, 1), 60),
            condition(ItemSelector::Category(item.category_id), 5, date(2024, 1, 1), 90),
        ];
        let matched = select(&conditions, &item);
        assert_eq!(matched.selected.map(|c| c.id), Some(conditions[1].id));
    }

    #[test]
    fn test_specificity_breaks_priority_tie() {
        let item = item();
        let conditions = vec![
            condition(ItemSelector::Category(item.category_id), 1, date(2024, 1, 1), 60),
            condition(ItemSelector::SubCategory(item.sub_category_id.unwrap()), 1, date(2024, 1, 1), 70),
            condition(ItemSelector::Item(item.item_id), 1, date(2023, 1, 1), 80),
        ];
        let matched = select(&conditions, &item);
        assert_eq!(matched.selected.map(|c| c.id), Some(conditions[2].id));
    }

    #[test]
    fn test_most_recent_wins_full_tie() {
        let item = item();
        let conditions = vec![
            condition(ItemSelector::Item(item.item_id), 1, date(2023, 1, 1), 60),
            condition(ItemSelector::Item(item.item_id), 1, date(2024, 2, 1), 70),
        ];
        let matched = select(&conditions, &item);
        assert_eq!(matched.selected.map(|c| c.id), Some(conditions[1].id));
    }

    #[test]
    fn test_ineligible_candidate_falls_through() {
        let item = item();
        let mut seniors_excluded = condition(ItemSelector::Item(item.item_id), 10, date(2024, 1, 1), 90);
        seniors_excluded.max_age = Some(65);
        let fallback = condition(ItemSelector::Category(item.category_id), 1, date(2024, 1, 1), 50);
        let conditions = vec![seniors_excluded, fallback];

        let matched = select(&conditions, &item);
        assert_eq!(matched.selected.map(|c| c.id), Some(conditions[1].id));
        assert_eq!(matched.rejected.len(), 1);
        assert!(matches!(
            matched.rejected[0].reason,
            RejectionReason::Ineligible(EligibilityFailure::AgeAboveMaximum { age: 70, max: 65 })
        ));
    }

    #[test]
    fn test_out_of_scope_and_retired_are_not_candidates() {
        let item = item();
        let mut retired = condition(ItemSelector::Item(item.item_id), 1, date(2024, 1, 1), 60);
        retired.lifecycle = Lifecycle::Retired;
        let other = condition(ItemSelector::Item(ItemId::new()), 1, date(2024, 1, 1), 60);
        let conditions = vec![retired, other];

        let matched = select(&conditions, &item);
        assert!(matched.selected.is_none());
        assert!(matched.rejected.is_empty());
    }
}
