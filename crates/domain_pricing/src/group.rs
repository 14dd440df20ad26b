//! Caps shared by a set of items
//!
//! A condition group limits covered usage across its members within a
//! calendar period, either by count of lines or by total insurer amount.
//! Group caps are tracked against usage history, never against the
//! condition that priced a line.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{is_in_force, ConditionGroupId, EffectivePeriod, Lifecycle, Money, PeriodType};

use crate::catalog::{ItemClassification, ItemSelector};
use crate::usage::UsageHistory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub id: ConditionGroupId,
    pub name: String,
    pub members: Vec<ItemSelector>,
    pub max_per_period: Option<u32>,
    pub max_total_amount: Option<Money>,
    pub period_type: PeriodType,
    pub period: EffectivePeriod,
    pub lifecycle: Lifecycle,
}

impl ConditionGroup {
    pub fn is_in_force(&self, as_of: NaiveDate) -> bool {
        is_in_force(self.lifecycle, &self.period, as_of)
    }

    pub fn contains(&self, item: &ItemClassification) -> bool {
        self.members.iter().any(|m| m.matches(item))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupCapKind {
    Count { max: u32, used: u32 },
    Amount { max: Money, used: Money, requested: Money },
}

/// A group cap the candidate line would exceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCapBreach {
    pub group_id: ConditionGroupId,
    pub group_name: String,
    pub period_type: PeriodType,
    pub kind: GroupCapKind,
}

impl fmt::Display for GroupCapBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GroupCapKind::Count { max, used } => write!(
                f,
                "group '{}' allows {} covered uses per {} period ({} used)",
                self.group_name, max, self.period_type, used
            ),
            GroupCapKind::Amount { max, used, requested } => write!(
                f,
                "group '{}' allows {} per {} period ({} used, {} requested)",
                self.group_name, max, self.period_type, used, requested
            ),
        }
    }
}

pub struct ConditionGroupTracker;

impl ConditionGroupTracker {
    /// Checks every in-force group containing the item
    ///
    /// `insurance_share` is the insurer amount the line would add. Groups are
    /// checked in id order and the first breach is returned.
    pub fn check(
        groups: &[ConditionGroup],
        item: &ItemClassification,
        history: &UsageHistory,
        insurance_share: Money,
        service_date: NaiveDate,
    ) -> Result<(), GroupCapBreach> {
        let mut applicable: Vec<&ConditionGroup> = groups
            .iter()
            .filter(|g| g.is_in_force(service_date) && g.contains(item))
            .collect();
        applicable.sort_by_key(|g| g.id);

        for group in applicable {
            Self::check_group(group, history, insurance_share, service_date)?;
        }
        Ok(())
    }

    fn check_group(
        group: &ConditionGroup,
        history: &UsageHistory,
        insurance_share: Money,
        service_date: NaiveDate,
    ) -> Result<(), GroupCapBreach> {
        let window = group.period_type.window(service_date);
        let members = move || history.covered_in_window(window).filter(move |r| group.contains(&r.item));

        if let Some(max) = group.max_per_period {
            let used = u32::try_from(members().count()).unwrap_or(u32::MAX);
            if used.saturating_add(1) > max {
                return Err(GroupCapBreach {
                    group_id: group.id,
                    group_name: group.name.clone(),
                    period_type: group.period_type,
                    kind: GroupCapKind::Count { max, used },
                });
            }
        }

        if let Some(max) = group.max_total_amount {
            let used: Money = members().map(|r| r.insurance_share).sum();
            if used + insurance_share > max {
                return Err(GroupCapBreach {
                    group_id: group.id,
                    group_name: group.name.clone(),
                    period_type: group.period_type,
                    kind: GroupCapKind::Amount { max, used, requested: insurance_share },
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageRecord;
    use core_kernel::{CategoryId, InvoiceId, ItemId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dental_item(category: CategoryId) -> ItemClassification {
        ItemClassification { item_id: ItemId::new(), category_id: category, sub_category_id: None, group_id: None }
    }

    fn group(category: CategoryId) -> ConditionGroup {
        ConditionGroup {
            id: ConditionGroupId::new(),
            name: "Dental".to_string(),
            members: vec![ItemSelector::Category(category)],
            max_per_period: None,
            max_total_amount: None,
            period_type: PeriodType::Monthly,
            period: EffectivePeriod::starting(date(2024, 1, 1)),
            lifecycle: Lifecycle::Active,
        }
    }

    fn used(item: ItemClassification, share: Money, on: NaiveDate, is_covered: bool) -> UsageRecord {
        UsageRecord {
            invoice_id: InvoiceId::new(),
            item,
            applied_condition_id: None,
            body_part_id: None,
            quantity: 1,
            insurance_share: share,
            service_date: on,
            is_covered,
        }
    }

    #[test]
    fn test_count_cap_across_members() {
        let dental = CategoryId::new();
        let mut g = group(dental);
        g.max_per_period = Some(2);

        let history: UsageHistory = vec![
            used(dental_item(dental), Money::new(dec!(100)), date(2024, 6, 3), true),
            used(dental_item(dental), Money::new(dec!(100)), date(2024, 6, 9), true),
        ]
        .into_iter()
        .collect();

        let breach = ConditionGroupTracker::check(&[g], &dental_item(dental), &history, Money::new(dec!(100)), date(2024, 6, 20))
            .unwrap_err();
        assert_eq!(breach.kind, GroupCapKind::Count { max: 2, used: 2 });
    }

    #[test]
    fn test_uncovered_usage_does_not_count() {
        let dental = CategoryId::new();
        let mut g = group(dental);
        g.max_per_period = Some(1);
        let history: UsageHistory =
            vec![used(dental_item(dental), Money::zero(), date(2024, 6, 3), false)].into_iter().collect();

        assert!(ConditionGroupTracker::check(&[g], &dental_item(dental), &history, Money::new(dec!(100)), date(2024, 6, 20))
            .is_ok());
    }

    #[test]
    fn test_amount_cap_includes_candidate() {
        let dental = CategoryId::new();
        let mut g = group(dental);
        g.max_total_amount = Some(Money::new(dec!(1000)));
        let history: UsageHistory =
            vec![used(dental_item(dental), Money::new(dec!(700)), date(2024, 6, 3), true)].into_iter().collect();

        let item = dental_item(dental);
        assert!(ConditionGroupTracker::check(std::slice::from_ref(&g), &item, &history, Money::new(dec!(300)), date(2024, 6, 20)).is_ok());
        assert!(ConditionGroupTracker::check(&[g], &item, &history, Money::new(dec!(301)), date(2024, 6, 20)).is_err());
    }

    #[test]
    fn test_non_member_is_unaffected() {
        let dental = CategoryId::new();
        let mut g = group(dental);
        g.max_per_period = Some(0);
        assert!(ConditionGroupTracker::check(&[g], &dental_item(CategoryId::new()), &UsageHistory::default(), Money::zero(), date(2024, 6, 20))
            .is_ok());
    }
}
