//! Adjudication outcomes
//!
//! Each line satisfies `total_price = insurance_share + patient_share +
//! discount_amount`. `deduction_amount` is what rules removed from the
//! insurer's side; for an uncovered line it is the whole line total.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BodyPartId, ConditionId, InvoiceId, ItemId, ItemPriceId, Money, Percentage};
use domain_pricing::{
    AppliedDiscount, GroupCapBreach, InteractionAlert, ItemClassification, RejectedCondition,
    UsageRecord,
};

/// Why part of a line was not paid by the insurer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeductionReason {
    NotPriced { as_of: NaiveDate },
    NotCovered { detail: String },
    RestrictionViolated { condition: String, detail: String },
    GroupCapExceeded { detail: String },
    CeilingExhausted { requested: Money, granted: Money },
    MaxCoveredAmount { cap: Money },
    QuantityCap { max_quantity: u32, requested: u32 },
    TariffExceeded { billed: Money, tariff: Money },
    PreApprovalRequired { condition: String },
}

impl fmt::Display for DeductionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeductionReason::NotPriced { as_of } => {
                write!(f, "item has no effective price on {}", as_of)
            }
            DeductionReason::NotCovered { detail } => write!(f, "not covered: {}", detail),
            DeductionReason::RestrictionViolated { condition, detail } => {
                write!(f, "condition '{}' restricted: {}", condition, detail)
            }
            DeductionReason::GroupCapExceeded { detail } => write!(f, "usage cap reached: {}", detail),
            DeductionReason::CeilingExhausted { requested, granted } => write!(
                f,
                "annual ceiling exhausted: {} requested, {} available",
                requested, granted
            ),
            DeductionReason::MaxCoveredAmount { cap } => {
                write!(f, "insurer share capped at {} per line", cap)
            }
            DeductionReason::QuantityCap { max_quantity, requested } => write!(
                f,
                "only {} of {} units covered",
                max_quantity, requested
            ),
            DeductionReason::TariffExceeded { billed, tariff } => write!(
                f,
                "billed price {} exceeds tariff {}",
                billed, tariff
            ),
            DeductionReason::PreApprovalRequired { condition } => {
                write!(f, "condition '{}' requires pre-approval", condition)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub reason: DeductionReason,
    pub amount: Money,
}

/// Where the coverage percentage came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CoverageSource {
    Condition { condition_id: ConditionId, name: String },
    BasePrice { price_id: ItemPriceId },
    Uncovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeilingTrace {
    pub requested: Money,
    pub granted: Money,
    pub remaining_before: Money,
    pub remaining_after: Money,
    /// Preview runs never write to the ledger
    pub simulated: bool,
}

/// Inputs and intermediate values behind a line outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingDetails {
    pub item_code: String,
    pub classification: ItemClassification,
    pub service_date: NaiveDate,
    pub price_id: Option<ItemPriceId>,
    pub tariff_unit_price: Option<Money>,
    pub billed_unit_price: Option<Money>,
    pub payable_unit_price: Option<Money>,
    pub quantity: u32,
    pub covered_quantity: u32,
    /// Amount the coverage percentage was applied to
    pub covered_base: Money,
    pub coverage_source: CoverageSource,
    pub coverage_percentage: Percentage,
    /// Insurer share before caps and the ceiling
    pub raw_insurance_share: Money,
    pub rejected_conditions: Vec<RejectedCondition>,
    pub group_breach: Option<GroupCapBreach>,
    pub discounts: Vec<AppliedDiscount>,
    pub discount_stacked: Money,
    pub ceiling: Option<CeilingTrace>,
    pub deductions: Vec<Deduction>,
}

impl PricingDetails {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Adjudicated result for one invoice line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub insurance_share: Money,
    pub patient_share: Money,
    pub coverage_percentage: Percentage,
    pub discount_amount: Money,
    pub deduction_amount: Money,
    pub deduction_reasons: Vec<String>,
    pub is_covered: bool,
    pub is_approved: bool,
    pub applied_condition_id: Option<ConditionId>,
    pub pricing_details: PricingDetails,
}

impl ItemOutcome {
    /// `total = insurer + patient + discount` and no negative share
    pub fn is_balanced(&self) -> bool {
        self.insurance_share + self.patient_share + self.discount_amount == self.total_price
            && !self.insurance_share.is_negative()
            && !self.patient_share.is_negative()
            && !self.discount_amount.is_negative()
    }

    /// The usage this line adds for later restriction and cap checks
    pub fn usage_record(
        &self,
        invoice_id: InvoiceId,
        service_date: NaiveDate,
        body_part_id: Option<BodyPartId>,
    ) -> UsageRecord {
        UsageRecord {
            invoice_id,
            item: self.pricing_details.classification,
            applied_condition_id: self.applied_condition_id,
            body_part_id,
            quantity: self.quantity,
            insurance_share: self.insurance_share,
            service_date,
            is_covered: self.is_covered && self.is_approved,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub total_price: Money,
    pub insurance_share: Money,
    pub patient_share: Money,
    pub discount_amount: Money,
    pub deduction_amount: Money,
}

impl InvoiceTotals {
    /// Elementwise sum over the lines
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ItemOutcome>) -> Self {
        items.into_iter().fold(Self::default(), |acc, i| Self {
            total_price: acc.total_price + i.total_price,
            insurance_share: acc.insurance_share + i.insurance_share,
            patient_share: acc.patient_share + i.patient_share,
            discount_amount: acc.discount_amount + i.discount_amount,
            deduction_amount: acc.deduction_amount + i.deduction_amount,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationMode {
    /// Debits the ceiling ledger
    Commit,
    /// Simulates the ceiling without writing
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationResult {
    pub invoice_id: InvoiceId,
    pub mode: AdjudicationMode,
    pub items: Vec<ItemOutcome>,
    pub totals: InvoiceTotals,
    /// Advisory, most severe first
    pub alerts: Vec<InteractionAlert>,
    pub calculated_at: DateTime<Utc>,
}

impl AdjudicationResult {
    pub fn requires_review(&self) -> bool {
        self.alerts.iter().any(|a| a.requires_review)
    }
}
