//! PostgreSQL adapter for InvoicePort and UsageHistoryPort
//!
//! Line outcomes are stored flattened next to the request columns, with the
//! full [`PricingDetails`] trace in a JSONB column.

use async_trait::async_trait;
use sqlx::PgPool;

use core_kernel::{
    DateWindow, DomainPort, EmployeeId, HealthCheckResult, HealthCheckable, InvoiceId, InvoiceItemId,
    ItemId, Money, PortError,
};
use domain_adjudication::{
    AdjudicationLine, Invoice, InvoiceLine, InvoicePort, InvoiceTotals, ItemOutcome, PricingDetails,
    UsageHistoryPort,
};
use domain_pricing::{ItemClassification, UsageRecord};

use super::convert;
use crate::repositories::invoice::{InvoiceItemRow, InvoiceRepository, InvoiceRow, UsageRow};

#[derive(Debug, Clone)]
pub struct PostgresInvoiceAdapter {
    pool: PgPool,
    repo: InvoiceRepository,
}

impl PostgresInvoiceAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: InvoiceRepository::new(pool.clone()),
            pool,
        }
    }
}

fn count_to_db(column: &str, value: u32) -> Result<i32, PortError> {
    i32::try_from(value).map_err(|e| PortError::validation(format!("{} out of range: {}", column, e)))
}

fn totals_from_row(row: &InvoiceRow) -> Option<InvoiceTotals> {
    Some(InvoiceTotals {
        total_price: Money::new(row.total_price?),
        insurance_share: Money::new(row.insurance_share?),
        patient_share: Money::new(row.patient_share?),
        discount_amount: Money::new(row.discount_amount?),
        deduction_amount: Money::new(row.deduction_amount?),
    })
}

fn outcome_from_row(row: &InvoiceItemRow, line_no: u32, quantity: u32) -> Result<Option<ItemOutcome>, PortError> {
    let Some(details) = row.pricing_details.clone() else {
        return Ok(None);
    };
    let pricing_details: PricingDetails = convert::json("pricing_details", details)?;
    let money = |v: Option<rust_decimal::Decimal>| Money::new(v.unwrap_or_default());

    Ok(Some(ItemOutcome {
        line_no,
        item_id: ItemId::from(row.item_id),
        quantity,
        unit_price: money(row.unit_price),
        total_price: money(row.total_price),
        insurance_share: money(row.insurance_share),
        patient_share: money(row.patient_share),
        coverage_percentage: convert::percentage("coverage_percentage", row.coverage_percentage.unwrap_or_default())?,
        discount_amount: money(row.discount_amount),
        deduction_amount: money(row.deduction_amount),
        deduction_reasons: row.deduction_reasons.clone().unwrap_or_default(),
        is_covered: row.is_covered.unwrap_or(false),
        is_approved: row.is_approved.unwrap_or(false),
        applied_condition_id: row.applied_condition_id.map(Into::into),
        pricing_details,
    }))
}

fn line_from_row(row: InvoiceItemRow) -> Result<InvoiceLine, PortError> {
    let line_no = convert::count("line_no", row.line_no)?;
    let quantity = convert::count("quantity", row.quantity)?;
    let outcome = outcome_from_row(&row, line_no, quantity)?;
    Ok(InvoiceLine {
        id: InvoiceItemId::from(row.id),
        line_no,
        request: AdjudicationLine {
            item_id: ItemId::from(row.item_id),
            quantity,
            unit_price: row.billed_unit_price.map(Money::new),
            body_part_id: row.body_part_id.map(Into::into),
            diagnosis_code: row.diagnosis_code,
            pre_approved: row.pre_approved,
        },
        outcome,
    })
}

fn invoice_from_rows(row: InvoiceRow, items: Vec<InvoiceItemRow>) -> Result<Invoice, PortError> {
    let totals = totals_from_row(&row);
    Ok(Invoice {
        id: InvoiceId::from(row.id),
        employee_id: row.employee_id.into(),
        insurance_id: row.insurance_id.into(),
        service_date: row.service_date,
        status: convert::parse("status", &row.status)?,
        lines: items.into_iter().map(line_from_row).collect::<Result<_, _>>()?,
        totals,
        calculated_at: row.calculated_at,
        decided_by: row.decided_by,
        decision_note: row.decision_note,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    let totals = invoice.totals;
    InvoiceRow {
        id: invoice.id.into(),
        employee_id: invoice.employee_id.into(),
        insurance_id: invoice.insurance_id.into(),
        service_date: invoice.service_date,
        status: invoice.status.as_str().to_string(),
        total_price: totals.map(|t| t.total_price.amount()),
        insurance_share: totals.map(|t| t.insurance_share.amount()),
        patient_share: totals.map(|t| t.patient_share.amount()),
        discount_amount: totals.map(|t| t.discount_amount.amount()),
        deduction_amount: totals.map(|t| t.deduction_amount.amount()),
        calculated_at: invoice.calculated_at,
        decided_by: invoice.decided_by.clone(),
        decision_note: invoice.decision_note.clone(),
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

fn line_to_row(invoice_id: InvoiceId, line: &InvoiceLine) -> Result<InvoiceItemRow, PortError> {
    let outcome = line.outcome.as_ref();
    Ok(InvoiceItemRow {
        id: line.id.into(),
        invoice_id: invoice_id.into(),
        line_no: count_to_db("line_no", line.line_no)?,
        item_id: line.request.item_id.into(),
        quantity: count_to_db("quantity", line.request.quantity)?,
        billed_unit_price: line.request.unit_price.map(|m| m.amount()),
        body_part_id: line.request.body_part_id.map(Into::into),
        diagnosis_code: line.request.diagnosis_code.clone(),
        pre_approved: line.request.pre_approved,
        unit_price: outcome.map(|o| o.unit_price.amount()),
        total_price: outcome.map(|o| o.total_price.amount()),
        insurance_share: outcome.map(|o| o.insurance_share.amount()),
        patient_share: outcome.map(|o| o.patient_share.amount()),
        coverage_percentage: outcome.map(|o| o.coverage_percentage.value()),
        discount_amount: outcome.map(|o| o.discount_amount.amount()),
        deduction_amount: outcome.map(|o| o.deduction_amount.amount()),
        deduction_reasons: outcome.map(|o| o.deduction_reasons.clone()),
        is_covered: outcome.map(|o| o.is_covered),
        is_approved: outcome.map(|o| o.is_approved),
        applied_condition_id: outcome.and_then(|o| o.applied_condition_id).map(Into::into),
        pricing_details: outcome
            .map(|o| convert::to_json("pricing_details", &o.pricing_details))
            .transpose()?,
    })
}

fn usage_from_row(row: UsageRow) -> Result<UsageRecord, PortError> {
    Ok(UsageRecord {
        invoice_id: InvoiceId::from(row.invoice_id),
        item: ItemClassification {
            item_id: ItemId::from(row.item_id),
            category_id: row.category_id.into(),
            sub_category_id: row.sub_category_id.map(Into::into),
            group_id: row.group_id.map(Into::into),
        },
        applied_condition_id: row.applied_condition_id.map(Into::into),
        body_part_id: row.body_part_id.map(Into::into),
        quantity: convert::count("quantity", row.quantity)?,
        insurance_share: Money::new(row.insurance_share),
        service_date: row.service_date,
        is_covered: row.is_covered,
    })
}

impl DomainPort for PostgresInvoiceAdapter {}

#[async_trait]
impl HealthCheckable for PostgresInvoiceAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-invoices").await
    }
}

#[async_trait]
impl InvoicePort for PostgresInvoiceAdapter {
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let (row, items) = self.repo.get(id.into()).await?;
        invoice_from_rows(row, items)
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        let row = invoice_to_row(invoice);
        let items = invoice
            .lines
            .iter()
            .map(|line| line_to_row(invoice.id, line))
            .collect::<Result<Vec<_>, _>>()?;
        self.repo.save(&row, &items).await?;
        Ok(())
    }
}

#[async_trait]
impl UsageHistoryPort for PostgresInvoiceAdapter {
    async fn usage_for(
        &self,
        employee_id: EmployeeId,
        window: DateWindow,
        exclude: Option<InvoiceId>,
    ) -> Result<Vec<UsageRecord>, PortError> {
        self.repo
            .usage(employee_id.into(), window.start, window.end, exclude.map(Into::into))
            .await?
            .into_iter()
            .map(usage_from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::InsuranceId;
    use domain_adjudication::InvoiceStatus;
    use rust_decimal_macros::dec;

    fn draft() -> Invoice {
        let mut line = AdjudicationLine::new(ItemId::new(), 2);
        line.unit_price = Some(Money::new(dec!(130)));
        line.diagnosis_code = Some("J45".to_string());
        Invoice::draft(
            EmployeeId::new(),
            InsuranceId::new(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            vec![line],
        )
    }

    #[test]
    fn test_draft_rows_have_no_outcome_columns() {
        let invoice = draft();
        let row = invoice_to_row(&invoice);
        assert_eq!(row.status, "draft");
        assert!(row.total_price.is_none());

        let item = line_to_row(invoice.id, &invoice.lines[0]).unwrap();
        assert_eq!(item.line_no, 1);
        assert_eq!(item.quantity, 2);
        assert_eq!(item.billed_unit_price, Some(dec!(130)));
        assert!(item.pricing_details.is_none());
    }

    #[test]
    fn test_draft_rows_read_back_as_draft() {
        let invoice = draft();
        let row = invoice_to_row(&invoice);
        let items = vec![line_to_row(invoice.id, &invoice.lines[0]).unwrap()];

        let restored = invoice_from_rows(row, items).unwrap();
        assert_eq!(restored.status, InvoiceStatus::Draft);
        assert!(restored.totals.is_none());
        assert_eq!(restored.lines[0].request, invoice.lines[0].request);
        assert!(restored.lines[0].outcome.is_none());
    }

    #[test]
    fn test_usage_row_conversion() {
        let row = UsageRow {
            invoice_id: uuid::Uuid::now_v7(),
            item_id: uuid::Uuid::now_v7(),
            category_id: uuid::Uuid::now_v7(),
            sub_category_id: None,
            group_id: None,
            applied_condition_id: None,
            body_part_id: None,
            quantity: 3,
            insurance_share: dec!(1500),
            service_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            is_covered: true,
        };
        let record = usage_from_row(row).unwrap();
        assert_eq!(record.quantity, 3);
        assert_eq!(record.insurance_share, Money::new(dec!(1500)));
    }
}
