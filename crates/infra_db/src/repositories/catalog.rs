//! Pricing catalog repository
//!
//! Read-only access to items, prices, conditions with their filters and
//! restrictions, condition groups, discounts and drug interactions.
//! Effective-date and lifecycle filtering is left to the domain, which
//! evaluates every rule against an explicit as-of date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_item(&self, id: Uuid) -> Result<ItemRow, DatabaseError> {
        sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, code, name, kind, category_id, sub_category_id, group_id, is_covered, is_active
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Item", id))
    }

    pub async fn prices_for_item(&self, item_id: Uuid) -> Result<Vec<ItemPriceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ItemPriceRow>(
            r#"
            SELECT id, item_id, price, insurer_share, patient_share,
                   effective_from, effective_to, lifecycle
            FROM item_prices
            WHERE item_id = $1
            ORDER BY effective_from DESC, id
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Conditions scoped to the item, its sub-category or its category
    pub async fn conditions_for_scope(&self, scope: &ScopeKeys) -> Result<Vec<ConditionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ConditionRow>(
            r#"
            SELECT id, name, scope_type, scope_id, coverage, patient_share_override,
                   max_covered_amount, max_quantity, requires_pre_approval, min_age, max_age,
                   gender, relation, waiting_days, priority, effective_from, effective_to, lifecycle
            FROM item_price_conditions
            WHERE (scope_type = 'item' AND scope_id = $1)
               OR (scope_type = 'sub_category' AND scope_id = $2)
               OR (scope_type = 'category' AND scope_id = $3)
            ORDER BY priority DESC, id
            "#,
        )
        .bind(scope.item_id)
        .bind(scope.sub_category_id)
        .bind(scope.category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_condition(&self, id: Uuid) -> Result<ConditionRow, DatabaseError> {
        sqlx::query_as::<_, ConditionRow>(
            r#"
            SELECT id, name, scope_type, scope_id, coverage, patient_share_override,
                   max_covered_amount, max_quantity, requires_pre_approval, min_age, max_age,
                   gender, relation, waiting_days, priority, effective_from, effective_to, lifecycle
            FROM item_price_conditions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("ItemPriceCondition", id))
    }

    pub async fn filters_for(&self, condition_ids: &[Uuid]) -> Result<Vec<FilterRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FilterRow>(
            r#"
            SELECT id, condition_id, filter_type, operator, filter_values
            FROM item_price_condition_filters
            WHERE condition_id = ANY($1)
            ORDER BY condition_id, id
            "#,
        )
        .bind(condition_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn restrictions_for(&self, condition_ids: &[Uuid]) -> Result<Vec<RestrictionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, RestrictionRow>(
            r#"
            SELECT id, condition_id, definition
            FROM item_price_condition_restrictions
            WHERE condition_id = ANY($1)
            ORDER BY condition_id, id
            "#,
        )
        .bind(condition_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Groups with at least one member selector matching the item
    pub async fn groups_for_scope(&self, scope: &ScopeKeys) -> Result<Vec<GroupRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT DISTINCT g.id, g.name, g.max_per_period, g.max_total_amount, g.period_type,
                   g.effective_from, g.effective_to, g.lifecycle
            FROM condition_groups g
            JOIN condition_group_items m ON m.group_id = g.id
            WHERE (m.scope_type = 'item' AND m.scope_id = $1)
               OR (m.scope_type = 'sub_category' AND m.scope_id = $2)
               OR (m.scope_type = 'category' AND m.scope_id = $3)
            ORDER BY g.id
            "#,
        )
        .bind(scope.item_id)
        .bind(scope.sub_category_id)
        .bind(scope.category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn group_members(&self, group_ids: &[Uuid]) -> Result<Vec<GroupMemberRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, GroupMemberRow>(
            r#"
            SELECT group_id, scope_type, scope_id
            FROM condition_group_items
            WHERE group_id = ANY($1)
            ORDER BY group_id, scope_type, scope_id
            "#,
        )
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Discounts whose definition names the employee, their code, or one of
    /// the item's scopes
    pub async fn candidate_discounts(
        &self,
        employee_id: Uuid,
        employee_code: Option<&str>,
        scope: &ScopeKeys,
        group_id: Option<Uuid>,
    ) -> Result<Vec<DiscountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DiscountRow>(
            r#"
            SELECT id, name, definition, percentage, max_amount, effective_from, effective_to, lifecycle
            FROM discounts
            WHERE (definition->>'type' = 'employee_special' AND definition->>'employee_id' = $1::text)
               OR (definition->>'type' = 'employee_code' AND definition->>'code' = $2)
               OR (definition->>'type' = 'item_set' AND definition->'scope'->>'id' IN ($3::text, $4::text, $5::text))
            ORDER BY id
            "#,
        )
        .bind(employee_id)
        .bind(employee_code)
        .bind(scope.item_id)
        .bind(scope.category_id)
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn interactions_among(&self, item_ids: &[Uuid]) -> Result<Vec<InteractionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT id, item_a, item_b, severity, description
            FROM drug_interactions
            WHERE item_a = ANY($1) AND item_b = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Scope columns a condition or group member may reference
#[derive(Debug, Clone, Copy)]
pub struct ScopeKeys {
    pub item_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub category_id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: String,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub is_covered: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemPriceRow {
    pub id: Uuid,
    pub item_id: Uuid,
    pub price: Decimal,
    pub insurer_share: Decimal,
    pub patient_share: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub lifecycle: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConditionRow {
    pub id: Uuid,
    pub name: String,
    pub scope_type: String,
    pub scope_id: Uuid,
    pub coverage: Decimal,
    pub patient_share_override: Option<Decimal>,
    pub max_covered_amount: Option<Decimal>,
    pub max_quantity: Option<i32>,
    pub requires_pre_approval: bool,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub gender: Option<String>,
    pub relation: Option<String>,
    pub waiting_days: Option<i32>,
    pub priority: i32,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub lifecycle: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FilterRow {
    pub id: Uuid,
    pub condition_id: Uuid,
    pub filter_type: String,
    pub operator: String,
    pub filter_values: Vec<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RestrictionRow {
    pub id: Uuid,
    pub condition_id: Uuid,
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRow {
    pub id: Uuid,
    pub name: String,
    pub max_per_period: Option<i32>,
    pub max_total_amount: Option<Decimal>,
    pub period_type: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub lifecycle: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupMemberRow {
    pub group_id: Uuid,
    pub scope_type: String,
    pub scope_id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscountRow {
    pub id: Uuid,
    pub name: String,
    pub definition: serde_json::Value,
    pub percentage: Decimal,
    pub max_amount: Option<Decimal>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub lifecycle: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InteractionRow {
    pub id: Uuid,
    pub item_a: Uuid,
    pub item_b: Uuid,
    pub severity: String,
    pub description: String,
}
