//! Insurance ceiling repository
//!
//! The ceiling columns are only written by [`InsuranceRepository::commit_change`],
//! which applies a version-checked update together with its audit rows and
//! ledger entries in one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct InsuranceRepository {
    pool: PgPool,
}

impl InsuranceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<InsuranceRow, DatabaseError> {
        sqlx::query_as::<_, InsuranceRow>(
            r#"
            SELECT id, employee_id, annual_ceiling, used_amount, remaining_amount,
                   start_date, end_date, version
            FROM insurances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Insurance", id))
    }

    pub async fn insert(&self, row: &InsuranceRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO insurances (
                id, employee_id, annual_ceiling, used_amount, remaining_amount,
                start_date, end_date, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.id)
        .bind(row.employee_id)
        .bind(row.annual_ceiling)
        .bind(row.used_amount)
        .bind(row.remaining_amount)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn open_entries(&self, insurance_id: Uuid, invoice_id: Uuid) -> Result<Vec<LedgerEntryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, insurance_id, invoice_id, line_no, amount, recorded_at, reversed_at
            FROM ceiling_ledger_entries
            WHERE insurance_id = $1 AND invoice_id = $2 AND reversed_at IS NULL
            ORDER BY line_no, recorded_at
            "#,
        )
        .bind(insurance_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn history(&self, insurance_id: Uuid) -> Result<Vec<HistoryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, insurance_id, field, old_value, new_value, actor, reason, invoice_id, recorded_at
            FROM insurance_histories
            WHERE insurance_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(insurance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Applies a ceiling change if the stored version still matches
    ///
    /// Returns `false` without writing anything when another writer got
    /// there first.
    pub async fn commit_change(&self, change: CeilingChangeRows) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE insurances
            SET used_amount = $1, remaining_amount = $2, version = $3
            WHERE id = $4 AND version = $5
            "#,
        )
        .bind(change.used_amount)
        .bind(change.remaining_amount)
        .bind(change.next_version)
        .bind(change.insurance_id)
        .bind(change.expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for row in &change.history {
            sqlx::query(
                r#"
                INSERT INTO insurance_histories (
                    id, insurance_id, field, old_value, new_value, actor, reason, invoice_id, recorded_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(row.id)
            .bind(row.insurance_id)
            .bind(&row.field)
            .bind(row.old_value)
            .bind(row.new_value)
            .bind(&row.actor)
            .bind(&row.reason)
            .bind(row.invoice_id)
            .bind(row.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &change.entries_added {
            sqlx::query(
                r#"
                INSERT INTO ceiling_ledger_entries (
                    id, insurance_id, invoice_id, line_no, amount, recorded_at, reversed_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(entry.id)
            .bind(entry.insurance_id)
            .bind(entry.invoice_id)
            .bind(entry.line_no)
            .bind(entry.amount)
            .bind(entry.recorded_at)
            .bind(entry.reversed_at)
            .execute(&mut *tx)
            .await?;
        }

        if !change.entries_reversed.is_empty() {
            sqlx::query(
                r#"
                UPDATE ceiling_ledger_entries
                SET reversed_at = $1
                WHERE id = ANY($2) AND reversed_at IS NULL
                "#,
            )
            .bind(change.reversed_at)
            .bind(&change.entries_reversed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InsuranceRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub annual_ceiling: Decimal,
    pub used_amount: Decimal,
    pub remaining_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub version: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub insurance_id: Uuid,
    pub field: String,
    pub old_value: Decimal,
    pub new_value: Decimal,
    pub actor: String,
    pub reason: String,
    pub invoice_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEntryRow {
    pub id: Uuid,
    pub insurance_id: Uuid,
    pub invoice_id: Uuid,
    pub line_no: i32,
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

/// Row-level form of one ledger operation
#[derive(Debug, Clone)]
pub struct CeilingChangeRows {
    pub insurance_id: Uuid,
    pub expected_version: i64,
    pub next_version: i64,
    pub used_amount: Decimal,
    pub remaining_amount: Decimal,
    pub history: Vec<HistoryRow>,
    pub entries_added: Vec<LedgerEntryRow>,
    pub entries_reversed: Vec<Uuid>,
    pub reversed_at: DateTime<Utc>,
}
