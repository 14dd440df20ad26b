//! Invoice DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_adjudication::{Invoice, InvoiceLine, InvoiceTotals, ItemOutcome};

use super::adjudication::{AdjudicationResponse, LineRequest};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateInvoiceRequest {
    pub employee_id: Uuid,
    pub service_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200), nested)]
    pub lines: Vec<LineRequest>,
}

/// Approve, reject and cancel body
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct DecisionRequest {
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceLineResponse {
    pub id: Uuid,
    pub line_no: u32,
    pub item_id: Uuid,
    pub quantity: u32,
    pub billed_unit_price: Option<Decimal>,
    pub body_part_id: Option<Uuid>,
    pub diagnosis_code: Option<String>,
    pub pre_approved: bool,
    pub outcome: Option<ItemOutcome>,
}

impl From<&InvoiceLine> for InvoiceLineResponse {
    fn from(line: &InvoiceLine) -> Self {
        Self {
            id: line.id.into(),
            line_no: line.line_no,
            item_id: line.request.item_id.into(),
            quantity: line.request.quantity,
            billed_unit_price: line.request.unit_price.map(|m| m.amount()),
            body_part_id: line.request.body_part_id.map(Into::into),
            diagnosis_code: line.request.diagnosis_code.clone(),
            pre_approved: line.request.pre_approved,
            outcome: line.outcome.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub insurance_id: Uuid,
    pub service_date: NaiveDate,
    pub status: String,
    pub lines: Vec<InvoiceLineResponse>,
    pub totals: Option<InvoiceTotals>,
    pub calculated_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id.into(),
            employee_id: invoice.employee_id.into(),
            insurance_id: invoice.insurance_id.into(),
            service_date: invoice.service_date,
            status: invoice.status.as_str().to_string(),
            lines: invoice.lines.iter().map(InvoiceLineResponse::from).collect(),
            totals: invoice.totals,
            calculated_at: invoice.calculated_at,
            decided_by: invoice.decided_by.clone(),
            decision_note: invoice.decision_note.clone(),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

/// Invoice state after calculation, with alerts
#[derive(Debug, Serialize)]
pub struct CalculationResponse {
    pub invoice: InvoiceResponse,
    pub adjudication: AdjudicationResponse,
}
