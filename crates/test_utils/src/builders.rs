//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about. Defaults: active reference data effective from 2024-01-01,
//! a 70/30 base price split, and a policyholder aged 40 on the service date.

use chrono::NaiveDate;
use fake::faker::lorem::en::Word;
use fake::faker::number::en::NumberWithFormat;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;

use core_kernel::{
    BodyPartId, CategoryId, ConditionFilterId, ConditionGroupId, ConditionId, DiscountId, EffectivePeriod,
    EmployeeId, InsuranceId, InteractionId, ItemGroupId, ItemId, ItemPriceId, Lifecycle, Money,
    Percentage, PeriodType, RestrictionId, SubCategoryId,
};
use domain_adjudication::AdjudicationLine;
use domain_insurance::Insurance;
use domain_pricing::{
    ConditionFilter, ConditionGroup, ConditionRestriction, Discount, DiscountKind, DrugInteraction,
    EmployeeContext, FilterOperator, FilterType, Gender, InteractionSeverity, Item, ItemKind, ItemPrice,
    ItemPriceCondition, ItemSelector, RelationType, RestrictionKind,
};

use crate::fixtures::Dates;

/// Panics on values outside 0..=100; builders are test-only
pub fn pct(value: Decimal) -> Percentage {
    Percentage::new(value).expect("percentage between 0 and 100")
}

pub fn money(value: Decimal) -> Money {
    Money::new(value)
}

fn default_period() -> EffectivePeriod {
    EffectivePeriod::starting(Dates::reference_start())
}

pub struct ItemBuilder {
    item: Item,
}

impl Default for ItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemBuilder {
    pub fn new() -> Self {
        let code: String = NumberWithFormat("DRG-####").fake();
        let name: String = Word().fake();
        Self {
            item: Item {
                id: ItemId::new(),
                code,
                name,
                kind: ItemKind::Drug,
                category_id: CategoryId::new(),
                sub_category_id: None,
                group_id: None,
                is_covered: true,
                is_active: true,
            },
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.item.code = code.into();
        self
    }

    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.item.kind = kind;
        self
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.item.category_id = category_id;
        self
    }

    pub fn sub_category(mut self, sub_category_id: SubCategoryId) -> Self {
        self.item.sub_category_id = Some(sub_category_id);
        self
    }

    pub fn group(mut self, group_id: ItemGroupId) -> Self {
        self.item.group_id = Some(group_id);
        self
    }

    /// Not covered when no condition matches
    pub fn uncovered(mut self) -> Self {
        self.item.is_covered = false;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.item.is_active = false;
        self
    }

    pub fn build(self) -> Item {
        self.item
    }
}

pub struct PriceBuilder {
    price: ItemPrice,
}

impl PriceBuilder {
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            price: ItemPrice {
                id: ItemPriceId::new(),
                item_id,
                price: money(dec!(1000000)),
                insurer_share: pct(dec!(70)),
                patient_share: pct(dec!(30)),
                period: default_period(),
                lifecycle: Lifecycle::Active,
            },
        }
    }

    pub fn price(mut self, amount: Decimal) -> Self {
        self.price.price = money(amount);
        self
    }

    /// Base split used when no condition matches
    pub fn shares(mut self, insurer: Decimal, patient: Decimal) -> Self {
        self.price.insurer_share = pct(insurer);
        self.price.patient_share = pct(patient);
        self
    }

    pub fn effective(mut self, from: NaiveDate, to: Option<NaiveDate>) -> Self {
        self.price.period = EffectivePeriod::new(from, to).expect("valid period");
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.price.lifecycle = lifecycle;
        self
    }

    pub fn build(self) -> ItemPrice {
        self.price
    }
}

pub struct ConditionBuilder {
    condition: ItemPriceCondition,
}

impl ConditionBuilder {
    pub fn new(scope: ItemSelector) -> Self {
        Self {
            condition: ItemPriceCondition {
                id: ConditionId::new(),
                name: format!("Condition {}", Word().fake::<String>()),
                scope,
                coverage: pct(dec!(80)),
                patient_share_override: None,
                max_covered_amount: None,
                max_quantity: None,
                requires_pre_approval: false,
                min_age: None,
                max_age: None,
                gender: None,
                relation: None,
                waiting_days: None,
                priority: 0,
                period: default_period(),
                lifecycle: Lifecycle::Active,
                filters: Vec::new(),
                restrictions: Vec::new(),
            },
        }
    }

    pub fn for_item(item_id: ItemId) -> Self {
        Self::new(ItemSelector::Item(item_id))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.condition.name = name.into();
        self
    }

    pub fn coverage(mut self, percentage: Decimal) -> Self {
        self.condition.coverage = pct(percentage);
        self
    }

    pub fn patient_share_override(mut self, percentage: Decimal) -> Self {
        self.condition.patient_share_override = Some(pct(percentage));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.condition.priority = priority;
        self
    }

    pub fn ages(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.condition.min_age = min;
        self.condition.max_age = max;
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.condition.gender = Some(gender);
        self
    }

    pub fn relation(mut self, relation: RelationType) -> Self {
        self.condition.relation = Some(relation);
        self
    }

    pub fn waiting_days(mut self, days: u32) -> Self {
        self.condition.waiting_days = Some(days);
        self
    }

    pub fn max_quantity(mut self, quantity: u32) -> Self {
        self.condition.max_quantity = Some(quantity);
        self
    }

    pub fn max_covered_amount(mut self, amount: Decimal) -> Self {
        self.condition.max_covered_amount = Some(money(amount));
        self
    }

    pub fn requires_pre_approval(mut self) -> Self {
        self.condition.requires_pre_approval = true;
        self
    }

    pub fn effective(mut self, from: NaiveDate, to: Option<NaiveDate>) -> Self {
        self.condition.period = EffectivePeriod::new(from, to).expect("valid period");
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.condition.lifecycle = lifecycle;
        self
    }

    pub fn filter(mut self, filter_type: FilterType, operator: FilterOperator, values: &[&str]) -> Self {
        self.condition.filters.push(ConditionFilter {
            id: ConditionFilterId::new(),
            filter_type,
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn restriction(mut self, kind: RestrictionKind) -> Self {
        self.condition.restrictions.push(ConditionRestriction {
            id: RestrictionId::new(),
            kind,
        });
        self
    }

    pub fn build(self) -> ItemPriceCondition {
        self.condition
    }
}

pub struct GroupBuilder {
    group: ConditionGroup,
}

impl GroupBuilder {
    pub fn new(period_type: PeriodType) -> Self {
        Self {
            group: ConditionGroup {
                id: ConditionGroupId::new(),
                name: format!("Group {}", Word().fake::<String>()),
                members: Vec::new(),
                max_per_period: None,
                max_total_amount: None,
                period_type,
                period: default_period(),
                lifecycle: Lifecycle::Active,
            },
        }
    }

    pub fn member(mut self, selector: ItemSelector) -> Self {
        self.group.members.push(selector);
        self
    }

    pub fn max_per_period(mut self, count: u32) -> Self {
        self.group.max_per_period = Some(count);
        self
    }

    pub fn max_total_amount(mut self, amount: Decimal) -> Self {
        self.group.max_total_amount = Some(money(amount));
        self
    }

    pub fn build(self) -> ConditionGroup {
        self.group
    }
}

pub struct DiscountBuilder {
    discount: Discount,
}

impl DiscountBuilder {
    pub fn new(kind: DiscountKind) -> Self {
        Self {
            discount: Discount {
                id: DiscountId::new(),
                name: format!("Discount {}", Word().fake::<String>()),
                kind,
                percentage: pct(dec!(10)),
                max_amount: None,
                period: default_period(),
                lifecycle: Lifecycle::Active,
            },
        }
    }

    pub fn for_employee(employee_id: EmployeeId) -> Self {
        Self::new(DiscountKind::EmployeeSpecial { employee_id, scope: None })
    }

    pub fn for_code(code: impl Into<String>) -> Self {
        Self::new(DiscountKind::EmployeeCode { code: code.into(), scope: None })
    }

    pub fn percentage(mut self, percentage: Decimal) -> Self {
        self.discount.percentage = pct(percentage);
        self
    }

    pub fn max_amount(mut self, amount: Decimal) -> Self {
        self.discount.max_amount = Some(money(amount));
        self
    }

    pub fn effective(mut self, from: NaiveDate, to: Option<NaiveDate>) -> Self {
        self.discount.period = EffectivePeriod::new(from, to).expect("valid period");
        self
    }

    pub fn build(self) -> Discount {
        self.discount
    }
}

pub fn interaction(item_a: ItemId, item_b: ItemId, severity: InteractionSeverity) -> DrugInteraction {
    DrugInteraction {
        id: InteractionId::new(),
        item_a,
        item_b,
        severity,
        description: format!("{} interaction", severity),
    }
}

pub struct EmployeeBuilder {
    employee: EmployeeContext,
}

impl Default for EmployeeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeBuilder {
    pub fn new() -> Self {
        Self {
            employee: EmployeeContext {
                employee_id: EmployeeId::new(),
                insurance_id: InsuranceId::new(),
                birth_date: Some(Dates::birth_date_for_age(40)),
                gender: None,
                relation: RelationType::Policyholder,
                province_code: None,
                location_code: None,
                employee_code: None,
                special_type: None,
                illness_codes: BTreeSet::new(),
                policy_start_date: Dates::policy_start(),
            },
        }
    }

    /// Age on [`Dates::service_date`]
    pub fn age(mut self, age: u32) -> Self {
        self.employee.birth_date = Some(Dates::birth_date_for_age(age));
        self
    }

    pub fn unknown_birth_date(mut self) -> Self {
        self.employee.birth_date = None;
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.employee.gender = Some(gender);
        self
    }

    pub fn relation(mut self, relation: RelationType) -> Self {
        self.employee.relation = relation;
        self
    }

    pub fn province(mut self, code: impl Into<String>) -> Self {
        self.employee.province_code = Some(code.into());
        self
    }

    pub fn employee_code(mut self, code: impl Into<String>) -> Self {
        self.employee.employee_code = Some(code.into());
        self
    }

    pub fn illness(mut self, code: impl Into<String>) -> Self {
        self.employee.illness_codes.insert(code.into());
        self
    }

    pub fn policy_start(mut self, date: NaiveDate) -> Self {
        self.employee.policy_start_date = date;
        self
    }

    pub fn insurance(mut self, insurance_id: InsuranceId) -> Self {
        self.employee.insurance_id = insurance_id;
        self
    }

    pub fn build(self) -> EmployeeContext {
        self.employee
    }
}

pub struct InsuranceBuilder {
    employee_id: EmployeeId,
    annual_ceiling: Money,
    used: Money,
}

impl InsuranceBuilder {
    pub fn for_employee(employee_id: EmployeeId) -> Self {
        Self {
            employee_id,
            annual_ceiling: money(dec!(10000000)),
            used: Money::zero(),
        }
    }

    pub fn ceiling(mut self, amount: Decimal) -> Self {
        self.annual_ceiling = money(amount);
        self
    }

    /// Leaves exactly `amount` of the ceiling available
    pub fn remaining(mut self, amount: Decimal) -> Self {
        self.used = self.annual_ceiling.saturating_sub(money(amount));
        self
    }

    pub fn build(self) -> Insurance {
        let mut insurance = Insurance::new(
            self.employee_id,
            self.annual_ceiling,
            Dates::policy_start(),
            Dates::policy_end(),
        );
        insurance.used_amount = self.used;
        insurance.remaining_amount = self.annual_ceiling - self.used;
        insurance
    }
}

pub struct LineBuilder {
    line: AdjudicationLine,
}

impl LineBuilder {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            line: AdjudicationLine::new(item_id, 1),
        }
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.line.quantity = quantity;
        self
    }

    pub fn billed(mut self, unit_price: Decimal) -> Self {
        self.line.unit_price = Some(money(unit_price));
        self
    }

    pub fn body_part(mut self, body_part_id: BodyPartId) -> Self {
        self.line.body_part_id = Some(body_part_id);
        self
    }

    pub fn diagnosis(mut self, code: impl Into<String>) -> Self {
        self.line.diagnosis_code = Some(code.into());
        self
    }

    pub fn pre_approved(mut self) -> Self {
        self.line.pre_approved = true;
        self
    }

    pub fn build(self) -> AdjudicationLine {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insurance_builder_keeps_ceiling_invariant() {
        let insurance = InsuranceBuilder::for_employee(EmployeeId::new())
            .ceiling(dec!(10000000))
            .remaining(dec!(500000))
            .build();
        assert_eq!(insurance.remaining_amount, money(dec!(500000)));
        assert_eq!(insurance.used_amount + insurance.remaining_amount, insurance.annual_ceiling);
        assert!(insurance.verify().is_ok());
    }

    #[test]
    fn test_employee_builder_age() {
        let employee = EmployeeBuilder::new().age(70).build();
        assert_eq!(employee.age_on(Dates::service_date()), Some(70));
    }

    #[test]
    fn test_item_code_is_generated() {
        let item = ItemBuilder::new().build();
        assert!(item.code.starts_with("DRG-"));
        assert!(item.is_covered && item.is_active);
    }
}
