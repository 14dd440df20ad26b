//! Discount stacking on the patient share
//!
//! Every applicable discount is computed on the line's patient share and
//! capped by its own maximum. The capped amounts are summed and the sum is
//! clamped to the patient share. The insurer portion is never touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{
    is_in_force, CategoryId, DiscountId, EffectivePeriod, EmployeeId, ItemGroupId, ItemId, Lifecycle,
    Money, Percentage,
};

use crate::catalog::ItemClassification;
use crate::employee::EmployeeContext;

/// Items a discount applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum DiscountScope {
    Item(ItemId),
    Category(CategoryId),
    Group(ItemGroupId),
}

impl DiscountScope {
    pub fn matches(&self, item: &ItemClassification) -> bool {
        match self {
            DiscountScope::Item(id) => item.item_id == *id,
            DiscountScope::Category(id) => item.category_id == *id,
            DiscountScope::Group(id) => item.group_id == Some(*id),
        }
    }
}

/// Who qualifies for a discount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Granted to one employee, optionally limited to some items
    EmployeeSpecial {
        employee_id: EmployeeId,
        scope: Option<DiscountScope>,
    },
    /// Granted to every employee carrying a custom employee code
    EmployeeCode {
        code: String,
        scope: Option<DiscountScope>,
    },
    /// Promotional discount on a set of items from a minimum quantity
    ItemSet {
        scope: DiscountScope,
        min_quantity: u32,
    },
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::EmployeeSpecial { .. } => "employee_special",
            DiscountKind::EmployeeCode { .. } => "employee_code",
            DiscountKind::ItemSet { .. } => "item_set",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub name: String,
    pub kind: DiscountKind,
    pub percentage: Percentage,
    pub max_amount: Option<Money>,
    pub period: EffectivePeriod,
    pub lifecycle: Lifecycle,
}

impl Discount {
    pub fn is_in_force(&self, as_of: NaiveDate) -> bool {
        is_in_force(self.lifecycle, &self.period, as_of)
    }

    /// True if the discount qualifies for this employee, item and quantity
    pub fn applies_to(&self, employee: &EmployeeContext, item: &ItemClassification, quantity: u32) -> bool {
        let in_scope = |scope: &Option<DiscountScope>| scope.map_or(true, |s| s.matches(item));
        match &self.kind {
            DiscountKind::EmployeeSpecial { employee_id, scope } => {
                *employee_id == employee.employee_id && in_scope(scope)
            }
            DiscountKind::EmployeeCode { code, scope } => {
                employee.employee_code.as_deref() == Some(code.as_str()) && in_scope(scope)
            }
            DiscountKind::ItemSet { scope, min_quantity } => scope.matches(item) && quantity >= *min_quantity,
        }
    }

    /// Amount for this discount alone: the percentage of `base`, capped
    pub fn amount_on(&self, base: Money, scale: u32) -> Money {
        let amount = self.percentage.apply(base).round_to_scale(scale);
        match self.max_amount {
            Some(cap) if amount > cap => cap,
            _ => amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub discount_id: DiscountId,
    pub name: String,
    pub kind: String,
    pub percentage: Percentage,
    /// Amount after the discount's own cap
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub applied: Vec<AppliedDiscount>,
    /// Sum of the capped amounts
    pub stacked: Money,
    /// Stacked amount clamped to the patient share
    pub total: Money,
}

pub struct DiscountAggregator;

impl DiscountAggregator {
    /// Stacks every qualifying discount on `patient_share`
    ///
    /// Discounts are considered in id order so the breakdown is stable.
    pub fn aggregate(
        discounts: &[Discount],
        employee: &EmployeeContext,
        item: &ItemClassification,
        quantity: u32,
        patient_share: Money,
        as_of: NaiveDate,
        scale: u32,
    ) -> DiscountBreakdown {
        let mut qualifying: Vec<&Discount> = discounts
            .iter()
            .filter(|d| d.is_in_force(as_of) && d.applies_to(employee, item, quantity))
            .collect();
        qualifying.sort_by_key(|d| d.id);

        let base = patient_share.floor_zero();
        let applied: Vec<AppliedDiscount> = qualifying
            .into_iter()
            .map(|d| AppliedDiscount {
                discount_id: d.id,
                name: d.name.clone(),
                kind: d.kind.as_str().to_string(),
                percentage: d.percentage,
                amount: d.amount_on(base, scale),
            })
            .collect();

        let stacked: Money = applied.iter().map(|a| a.amount).sum();
        let total = stacked.min(base);

        DiscountBreakdown { applied, stacked, total }
    }
}
