//! Invoice repository
//!
//! Invoices are saved whole: the header is upserted and the lines are
//! replaced inside one transaction. Usage history for restrictions and
//! group caps is read back from the adjudicated lines.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<(InvoiceRow, Vec<InvoiceItemRow>), DatabaseError> {
        let invoice = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, employee_id, insurance_id, service_date, status,
                   total_price, insurance_share, patient_share, discount_amount, deduction_amount,
                   calculated_at, decided_by, decision_note, created_at, updated_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))?;

        let items = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT id, invoice_id, line_no, item_id, quantity, billed_unit_price, body_part_id,
                   diagnosis_code, pre_approved, unit_price, total_price, insurance_share,
                   patient_share, coverage_percentage, discount_amount, deduction_amount,
                   deduction_reasons, is_covered, is_approved, applied_condition_id, pricing_details
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok((invoice, items))
    }

    pub async fn save(&self, invoice: &InvoiceRow, items: &[InvoiceItemRow]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, employee_id, insurance_id, service_date, status,
                total_price, insurance_share, patient_share, discount_amount, deduction_amount,
                calculated_at, decided_by, decision_note, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                total_price = EXCLUDED.total_price,
                insurance_share = EXCLUDED.insurance_share,
                patient_share = EXCLUDED.patient_share,
                discount_amount = EXCLUDED.discount_amount,
                deduction_amount = EXCLUDED.deduction_amount,
                calculated_at = EXCLUDED.calculated_at,
                decided_by = EXCLUDED.decided_by,
                decision_note = EXCLUDED.decision_note,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.employee_id)
        .bind(invoice.insurance_id)
        .bind(invoice.service_date)
        .bind(&invoice.status)
        .bind(invoice.total_price)
        .bind(invoice.insurance_share)
        .bind(invoice.patient_share)
        .bind(invoice.discount_amount)
        .bind(invoice.deduction_amount)
        .bind(invoice.calculated_at)
        .bind(&invoice.decided_by)
        .bind(&invoice.decision_note)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice.id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, line_no, item_id, quantity, billed_unit_price, body_part_id,
                    diagnosis_code, pre_approved, unit_price, total_price, insurance_share,
                    patient_share, coverage_percentage, discount_amount, deduction_amount,
                    deduction_reasons, is_covered, is_approved, applied_condition_id, pricing_details
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
                )
                "#,
            )
            .bind(item.id)
            .bind(item.invoice_id)
            .bind(item.line_no)
            .bind(item.item_id)
            .bind(item.quantity)
            .bind(item.billed_unit_price)
            .bind(item.body_part_id)
            .bind(&item.diagnosis_code)
            .bind(item.pre_approved)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(item.insurance_share)
            .bind(item.patient_share)
            .bind(item.coverage_percentage)
            .bind(item.discount_amount)
            .bind(item.deduction_amount)
            .bind(&item.deduction_reasons)
            .bind(item.is_covered)
            .bind(item.is_approved)
            .bind(item.applied_condition_id)
            .bind(&item.pricing_details)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Adjudicated lines for an employee within a service-date window
    ///
    /// Skips drafts, cancelled and rejected invoices, and `exclude`.
    pub async fn usage(
        &self,
        employee_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Vec<UsageRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT ii.invoice_id, ii.item_id, it.category_id, it.sub_category_id, it.group_id,
                   ii.applied_condition_id, ii.body_part_id, ii.quantity,
                   COALESCE(ii.insurance_share, 0) AS insurance_share,
                   i.service_date,
                   COALESCE(ii.is_covered AND ii.is_approved, FALSE) AS is_covered
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            JOIN items it ON it.id = ii.item_id
            WHERE i.employee_id = $1
              AND i.service_date BETWEEN $2 AND $3
              AND i.status IN ('calculated', 'submitted', 'approved')
              AND ($4::uuid IS NULL OR i.id <> $4)
              AND ii.pricing_details IS NOT NULL
            ORDER BY i.service_date, i.id, ii.line_no
            "#,
        )
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub insurance_id: Uuid,
    pub service_date: NaiveDate,
    pub status: String,
    pub total_price: Option<Decimal>,
    pub insurance_share: Option<Decimal>,
    pub patient_share: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub deduction_amount: Option<Decimal>,
    pub calculated_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One invoice line; outcome columns are null until calculated
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub line_no: i32,
    pub item_id: Uuid,
    pub quantity: i32,
    pub billed_unit_price: Option<Decimal>,
    pub body_part_id: Option<Uuid>,
    pub diagnosis_code: Option<String>,
    pub pre_approved: bool,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub insurance_share: Option<Decimal>,
    pub patient_share: Option<Decimal>,
    pub coverage_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub deduction_amount: Option<Decimal>,
    pub deduction_reasons: Option<Vec<String>>,
    pub is_covered: Option<bool>,
    pub is_approved: Option<bool>,
    pub applied_condition_id: Option<Uuid>,
    pub pricing_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageRow {
    pub invoice_id: Uuid,
    pub item_id: Uuid,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub applied_condition_id: Option<Uuid>,
    pub body_part_id: Option<Uuid>,
    pub quantity: i32,
    pub insurance_share: Decimal,
    pub service_date: NaiveDate,
    pub is_covered: bool,
}
