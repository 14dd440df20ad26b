//! Adjudication DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::{ItemId, Money};
use domain_adjudication::{AdjudicationLine, AdjudicationResult};
use domain_pricing::{EligibilityFailure, InteractionAlert};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

/// One billed line
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LineRequest {
    pub item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
    /// Billed unit price; the tariff applies when omitted
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Option<Decimal>,
    pub body_part_id: Option<Uuid>,
    #[validate(length(min = 1, max = 32))]
    pub diagnosis_code: Option<String>,
    #[serde(default)]
    pub pre_approved: bool,
}

impl From<&LineRequest> for AdjudicationLine {
    fn from(line: &LineRequest) -> Self {
        AdjudicationLine {
            item_id: ItemId::from(line.item_id),
            quantity: line.quantity,
            unit_price: line.unit_price.map(Money::new),
            body_part_id: line.body_part_id.map(Into::into),
            diagnosis_code: line.diagnosis_code.clone(),
            pre_approved: line.pre_approved,
        }
    }
}

pub fn to_lines(lines: &[LineRequest]) -> Vec<AdjudicationLine> {
    lines.iter().map(AdjudicationLine::from).collect()
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PreviewRequest {
    pub employee_id: Uuid,
    /// Defaults to today in the configured timezone
    pub service_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200), nested)]
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Serialize)]
pub struct AdjudicationResponse {
    #[serde(flatten)]
    pub result: AdjudicationResult,
    pub requires_review: bool,
}

impl From<AdjudicationResult> for AdjudicationResponse {
    fn from(result: AdjudicationResult) -> Self {
        Self {
            requires_review: result.requires_review(),
            result,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ScreenRequest {
    #[validate(length(min = 1, max = 200))]
    pub item_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ScreenResponse {
    pub alerts: Vec<InteractionAlert>,
    pub requires_review: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EligibilityRequest {
    pub employee_id: Uuid,
    pub service_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    #[serde(flatten)]
    pub failure: EligibilityFailure,
    pub message: String,
}

impl From<EligibilityFailure> for FailureResponse {
    fn from(failure: EligibilityFailure) -> Self {
        Self {
            message: failure.to_string(),
            failure,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub condition_id: Uuid,
    pub condition_name: String,
    pub service_date: NaiveDate,
    pub eligible: bool,
    pub failures: Vec<FailureResponse>,
}
