//! PostgreSQL adapter for PricingCatalogPort

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use core_kernel::{
    ConditionFilterId, ConditionGroupId, ConditionId, DiscountId, DomainPort, HealthCheckResult,
    HealthCheckable, InteractionId, ItemId, ItemPriceId, Money, PortError, RestrictionId,
};
use domain_pricing::{
    ConditionFilter, ConditionGroup, ConditionRestriction, Discount, DrugInteraction, EmployeeContext,
    Item, ItemClassification, ItemPrice, ItemPriceCondition, ItemSelector, PricingCatalogPort,
};

use super::convert;
use crate::repositories::catalog::{
    CatalogRepository, ConditionRow, DiscountRow, FilterRow, GroupRow, InteractionRow, ItemPriceRow,
    ItemRow, RestrictionRow, ScopeKeys,
};

/// Serves reference data from the catalog tables
#[derive(Debug, Clone)]
pub struct PostgresCatalogAdapter {
    pool: PgPool,
    repo: CatalogRepository,
}

impl PostgresCatalogAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: CatalogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Attaches filters and restrictions to condition rows
    async fn assemble_conditions(&self, rows: Vec<ConditionRow>) -> Result<Vec<ItemPriceCondition>, PortError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let mut filters: HashMap<Uuid, Vec<ConditionFilter>> = HashMap::new();
        for row in self.repo.filters_for(&ids).await? {
            let condition_id = row.condition_id;
            filters.entry(condition_id).or_default().push(filter_from_row(row)?);
        }

        let mut restrictions: HashMap<Uuid, Vec<ConditionRestriction>> = HashMap::new();
        for row in self.repo.restrictions_for(&ids).await? {
            let condition_id = row.condition_id;
            restrictions.entry(condition_id).or_default().push(restriction_from_row(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                condition_from_row(
                    row,
                    filters.remove(&id).unwrap_or_default(),
                    restrictions.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }
}

fn scope_keys(item: &ItemClassification) -> ScopeKeys {
    ScopeKeys {
        item_id: item.item_id.into(),
        sub_category_id: item.sub_category_id.map(Into::into),
        category_id: item.category_id.into(),
    }
}

fn item_from_row(row: ItemRow) -> Result<Item, PortError> {
    Ok(Item {
        id: ItemId::from(row.id),
        kind: convert::parse("kind", &row.kind)?,
        code: row.code,
        name: row.name,
        category_id: row.category_id.into(),
        sub_category_id: row.sub_category_id.map(Into::into),
        group_id: row.group_id.map(Into::into),
        is_covered: row.is_covered,
        is_active: row.is_active,
    })
}

fn price_from_row(row: ItemPriceRow) -> Result<ItemPrice, PortError> {
    Ok(ItemPrice {
        id: ItemPriceId::from(row.id),
        item_id: ItemId::from(row.item_id),
        price: Money::new(row.price),
        insurer_share: convert::percentage("insurer_share", row.insurer_share)?,
        patient_share: convert::percentage("patient_share", row.patient_share)?,
        period: convert::period(row.effective_from, row.effective_to)?,
        lifecycle: convert::parse("lifecycle", &row.lifecycle)?,
    })
}

fn filter_from_row(row: FilterRow) -> Result<ConditionFilter, PortError> {
    Ok(ConditionFilter {
        id: ConditionFilterId::from(row.id),
        filter_type: convert::parse("filter_type", &row.filter_type)?,
        operator: convert::parse("operator", &row.operator)?,
        values: row.filter_values.into_iter().collect::<BTreeSet<_>>(),
    })
}

fn restriction_from_row(row: RestrictionRow) -> Result<ConditionRestriction, PortError> {
    Ok(ConditionRestriction {
        id: RestrictionId::from(row.id),
        kind: convert::json("definition", row.definition)?,
    })
}

fn condition_from_row(
    row: ConditionRow,
    filters: Vec<ConditionFilter>,
    restrictions: Vec<ConditionRestriction>,
) -> Result<ItemPriceCondition, PortError> {
    Ok(ItemPriceCondition {
        id: ConditionId::from(row.id),
        scope: convert::selector(&row.scope_type, row.scope_id)?,
        coverage: convert::percentage("coverage", row.coverage)?,
        patient_share_override: row
            .patient_share_override
            .map(|v| convert::percentage("patient_share_override", v))
            .transpose()?,
        max_covered_amount: row.max_covered_amount.map(Money::new),
        max_quantity: convert::count_opt("max_quantity", row.max_quantity)?,
        requires_pre_approval: row.requires_pre_approval,
        min_age: convert::count_opt("min_age", row.min_age)?,
        max_age: convert::count_opt("max_age", row.max_age)?,
        gender: convert::parse_opt("gender", row.gender.as_deref())?,
        relation: convert::parse_opt("relation", row.relation.as_deref())?,
        waiting_days: convert::count_opt("waiting_days", row.waiting_days)?,
        priority: row.priority,
        period: convert::period(row.effective_from, row.effective_to)?,
        lifecycle: convert::parse("lifecycle", &row.lifecycle)?,
        name: row.name,
        filters,
        restrictions,
    })
}

fn group_from_row(row: GroupRow, members: Vec<ItemSelector>) -> Result<ConditionGroup, PortError> {
    Ok(ConditionGroup {
        id: ConditionGroupId::from(row.id),
        name: row.name,
        members,
        max_per_period: convert::count_opt("max_per_period", row.max_per_period)?,
        max_total_amount: row.max_total_amount.map(Money::new),
        period_type: convert::parse("period_type", &row.period_type)?,
        period: convert::period(row.effective_from, row.effective_to)?,
        lifecycle: convert::parse("lifecycle", &row.lifecycle)?,
    })
}

fn discount_from_row(row: DiscountRow) -> Result<Discount, PortError> {
    Ok(Discount {
        id: DiscountId::from(row.id),
        name: row.name,
        kind: convert::json("definition", row.definition)?,
        percentage: convert::percentage("percentage", row.percentage)?,
        max_amount: row.max_amount.map(Money::new),
        period: convert::period(row.effective_from, row.effective_to)?,
        lifecycle: convert::parse("lifecycle", &row.lifecycle)?,
    })
}

fn interaction_from_row(row: InteractionRow) -> Result<DrugInteraction, PortError> {
    Ok(DrugInteraction {
        id: InteractionId::from(row.id),
        item_a: ItemId::from(row.item_a),
        item_b: ItemId::from(row.item_b),
        severity: convert::parse("severity", &row.severity)?,
        description: row.description,
    })
}

impl DomainPort for PostgresCatalogAdapter {}

#[async_trait]
impl HealthCheckable for PostgresCatalogAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-catalog").await
    }
}

#[async_trait]
impl PricingCatalogPort for PostgresCatalogAdapter {
    async fn get_item(&self, id: ItemId) -> Result<Item, PortError> {
        item_from_row(self.repo.get_item(id.into()).await?)
    }

    async fn item_prices(&self, item_id: ItemId) -> Result<Vec<ItemPrice>, PortError> {
        self.repo
            .prices_for_item(item_id.into())
            .await?
            .into_iter()
            .map(price_from_row)
            .collect()
    }

    async fn conditions_for(&self, item: &ItemClassification) -> Result<Vec<ItemPriceCondition>, PortError> {
        let rows = self.repo.conditions_for_scope(&scope_keys(item)).await?;
        self.assemble_conditions(rows).await
    }

    async fn get_condition(&self, id: ConditionId) -> Result<ItemPriceCondition, PortError> {
        let row = self.repo.get_condition(id.into()).await?;
        let mut conditions = self.assemble_conditions(vec![row]).await?;
        conditions
            .pop()
            .ok_or_else(|| PortError::not_found("ItemPriceCondition", id))
    }

    async fn groups_for(&self, item: &ItemClassification) -> Result<Vec<ConditionGroup>, PortError> {
        let rows = self.repo.groups_for_scope(&scope_keys(item)).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let mut members: HashMap<Uuid, Vec<ItemSelector>> = HashMap::new();
        for member in self.repo.group_members(&ids).await? {
            members
                .entry(member.group_id)
                .or_default()
                .push(convert::selector(&member.scope_type, member.scope_id)?);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                group_from_row(row, members.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn discounts_for(
        &self,
        employee: &EmployeeContext,
        item: &ItemClassification,
    ) -> Result<Vec<Discount>, PortError> {
        self.repo
            .candidate_discounts(
                employee.employee_id.into(),
                employee.employee_code.as_deref(),
                &scope_keys(item),
                item.group_id.map(Into::into),
            )
            .await?
            .into_iter()
            .map(discount_from_row)
            .collect()
    }

    async fn interactions_among(&self, item_ids: &[ItemId]) -> Result<Vec<DrugInteraction>, PortError> {
        let ids: Vec<Uuid> = item_ids.iter().map(|id| (*id).into()).collect();
        self.repo
            .interactions_among(&ids)
            .await?
            .into_iter()
            .map(interaction_from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain_pricing::{DiscountKind, RestrictionKind};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_condition_row_conversion() {
        let item = Uuid::now_v7();
        let row = ConditionRow {
            id: Uuid::now_v7(),
            name: "Adults".to_string(),
            scope_type: "item".to_string(),
            scope_id: item,
            coverage: dec!(80),
            patient_share_override: None,
            max_covered_amount: Some(dec!(250000)),
            max_quantity: Some(3),
            requires_pre_approval: false,
            min_age: Some(18),
            max_age: Some(60),
            gender: Some("female".to_string()),
            relation: None,
            waiting_days: None,
            priority: 10,
            effective_from: date(2024, 1, 1),
            effective_to: None,
            lifecycle: "active".to_string(),
        };

        let condition = condition_from_row(row, vec![], vec![]).unwrap();
        assert_eq!(condition.scope, ItemSelector::Item(ItemId::from(item)));
        assert_eq!(condition.max_quantity, Some(3));
        assert_eq!(condition.coverage.value(), dec!(80));
        assert!(condition.gender.is_some());
    }

    #[test]
    fn test_condition_row_with_bad_gender_fails() {
        let row = ConditionRow {
            id: Uuid::now_v7(),
            name: "Broken".to_string(),
            scope_type: "category".to_string(),
            scope_id: Uuid::now_v7(),
            coverage: dec!(50),
            patient_share_override: None,
            max_covered_amount: None,
            max_quantity: None,
            requires_pre_approval: false,
            min_age: None,
            max_age: None,
            gender: Some("unknown".to_string()),
            relation: None,
            waiting_days: None,
            priority: 0,
            effective_from: date(2024, 1, 1),
            effective_to: None,
            lifecycle: "active".to_string(),
        };
        assert!(condition_from_row(row, vec![], vec![]).is_err());
    }

    #[test]
    fn test_restriction_definition_is_decoded() {
        let row = RestrictionRow {
            id: Uuid::now_v7(),
            condition_id: Uuid::now_v7(),
            definition: serde_json::json!({"type": "max_count", "max_count": 2, "period": "monthly"}),
        };
        let restriction = restriction_from_row(row).unwrap();
        assert!(matches!(restriction.kind, RestrictionKind::MaxCount { max_count: 2, .. }));
    }

    #[test]
    fn test_discount_definition_is_decoded() {
        let row = DiscountRow {
            id: Uuid::now_v7(),
            name: "Staff".to_string(),
            definition: serde_json::json!({"type": "employee_code", "code": "STAFF", "scope": null}),
            percentage: dec!(50),
            max_amount: None,
            effective_from: date(2024, 1, 1),
            effective_to: Some(date(2024, 12, 31)),
            lifecycle: "active".to_string(),
        };
        let discount = discount_from_row(row).unwrap();
        assert!(matches!(discount.kind, DiscountKind::EmployeeCode { ref code, scope: None } if code == "STAFF"));
    }
}
