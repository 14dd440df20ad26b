//! Pricing of a single invoice line
//!
//! Runs every rule up to, but not including, the ceiling debit:
//!
//! 1. resolve the tariff and cap the billed unit price at it
//! 2. select a condition (eligibility, then restrictions)
//! 3. apply the quantity cap, coverage percentage and max covered amount
//! 4. check group caps against usage history
//! 5. stack discounts on the patient share
//!
//! The result is settled against the ceiling by the adjudicator, which
//! owns the ledger. Everything here is a pure function of its inputs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{BodyPartId, ConditionId, ItemId, Money, Percentage};
use domain_pricing::{
    ConditionGroup, ConditionGroupTracker, ConditionMatcher, Discount, DiscountAggregator,
    DiscountBreakdown, EmployeeContext, Item, ItemClassification, ItemPrice, ItemPriceCondition,
    PriceResolver, RejectionReason, RestrictionContext, UsageHistory,
};

use crate::outcome::{
    CeilingTrace, CoverageSource, Deduction, DeductionReason, ItemOutcome, PricingDetails,
};

/// One line of an adjudication request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationLine {
    pub item_id: ItemId,
    pub quantity: u32,
    /// Billed unit price; the tariff is used when absent
    pub unit_price: Option<Money>,
    pub body_part_id: Option<BodyPartId>,
    pub diagnosis_code: Option<String>,
    pub pre_approved: bool,
}

impl AdjudicationLine {
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity,
            unit_price: None,
            body_part_id: None,
            diagnosis_code: None,
            pre_approved: false,
        }
    }
}

/// Everything needed to price one line
#[derive(Debug, Clone, Copy)]
pub struct LineInputs<'a> {
    pub line_no: u32,
    pub line: &'a AdjudicationLine,
    pub item: &'a Item,
    pub prices: &'a [ItemPrice],
    pub conditions: &'a [ItemPriceCondition],
    pub groups: &'a [ConditionGroup],
    pub discounts: &'a [Discount],
    pub employee: &'a EmployeeContext,
    /// Prior usage plus the earlier lines of this invoice
    pub history: &'a UsageHistory,
    /// Items on the other lines of this invoice
    pub other_items: &'a [ItemId],
    pub service_date: NaiveDate,
    pub scale: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Covered,
    /// A condition matched but its pre-approval is missing
    NotApproved,
    Uncovered,
}

/// A line priced up to the ceiling debit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub line_no: u32,
    pub item: ItemClassification,
    pub body_part_id: Option<BodyPartId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    /// Insurer share the ceiling is asked for
    pub insurance_requested: Money,
    pub coverage_percentage: Percentage,
    pub discount: DiscountBreakdown,
    pub status: LineStatus,
    pub applied_condition_id: Option<ConditionId>,
    pub details: PricingDetails,
}

impl PricedLine {
    /// Finalises the line with the ceiling grant
    ///
    /// `ceiling` is `None` when nothing was requested.
    pub fn settle(self, ceiling: Option<CeilingTrace>) -> ItemOutcome {
        let PricedLine {
            line_no,
            item,
            quantity,
            unit_price,
            total_price,
            insurance_requested,
            coverage_percentage,
            discount,
            status,
            applied_condition_id,
            mut details,
            ..
        } = self;

        let insurance_share = match ceiling {
            Some(trace) => {
                if trace.granted < insurance_requested {
                    details.deductions.push(Deduction {
                        reason: DeductionReason::CeilingExhausted {
                            requested: insurance_requested,
                            granted: trace.granted,
                        },
                        amount: insurance_requested - trace.granted,
                    });
                }
                trace.granted
            }
            None => insurance_requested,
        };
        details.ceiling = ceiling;
        details.discounts = discount.applied;
        details.discount_stacked = discount.stacked;

        let patient_share = total_price - insurance_share - discount.total;
        let deduction_amount = match status {
            LineStatus::Covered => details.deductions.iter().map(|d| d.amount).sum(),
            LineStatus::NotApproved | LineStatus::Uncovered => total_price,
        };
        let deduction_reasons = details.deductions.iter().map(|d| d.reason.to_string()).collect();

        ItemOutcome {
            line_no,
            item_id: item.item_id,
            quantity,
            unit_price,
            total_price,
            insurance_share,
            patient_share,
            coverage_percentage,
            discount_amount: discount.total,
            deduction_amount,
            deduction_reasons,
            is_covered: status != LineStatus::Uncovered,
            is_approved: status == LineStatus::Covered,
            applied_condition_id,
            pricing_details: details,
        }
    }
}

enum Coverage {
    Covered {
        insurance_share: Money,
        percentage: Percentage,
        condition_id: Option<ConditionId>,
    },
    NotApproved {
        condition_id: ConditionId,
        condition: String,
    },
    Uncovered(DeductionReason),
}

/// Prices a line up to the ceiling debit
pub fn price_line(inputs: &LineInputs<'_>) -> PricedLine {
    let line = inputs.line;
    let item = inputs.item;
    let classification = item.classification();
    let scale = inputs.scale;
    let quantity = Decimal::from(line.quantity);

    let mut details = PricingDetails {
        item_code: item.code.clone(),
        classification,
        service_date: inputs.service_date,
        price_id: None,
        tariff_unit_price: None,
        billed_unit_price: line.unit_price,
        payable_unit_price: None,
        quantity: line.quantity,
        covered_quantity: 0,
        covered_base: Money::zero(),
        coverage_source: CoverageSource::Uncovered,
        coverage_percentage: Percentage::ZERO,
        raw_insurance_share: Money::zero(),
        rejected_conditions: vec![],
        group_breach: None,
        discounts: vec![],
        discount_stacked: Money::zero(),
        ceiling: None,
        deductions: vec![],
    };

    let price = match PriceResolver::resolve(inputs.prices, item.id, inputs.service_date) {
        Ok(price) => price,
        Err(_) => {
            // The patient is billed the submitted amount; discounts need a tariff
            let unit_price = line.unit_price.unwrap_or_else(Money::zero);
            let total_price = unit_price.multiply(quantity).round_to_scale(scale);
            details.deductions.push(Deduction {
                reason: DeductionReason::NotPriced { as_of: inputs.service_date },
                amount: total_price,
            });
            return PricedLine {
                line_no: inputs.line_no,
                item: classification,
                body_part_id: line.body_part_id,
                quantity: line.quantity,
                unit_price,
                total_price,
                insurance_requested: Money::zero(),
                coverage_percentage: Percentage::ZERO,
                discount: DiscountBreakdown::default(),
                status: LineStatus::Uncovered,
                applied_condition_id: None,
                details,
            };
        }
    };

    let tariff = price.price;
    let billed = line.unit_price.unwrap_or(tariff);
    let payable = billed.min(tariff);
    let total_price = billed.multiply(quantity).round_to_scale(scale);
    let payable_total = payable.multiply(quantity).round_to_scale(scale);

    details.price_id = Some(price.id);
    details.tariff_unit_price = Some(tariff);
    details.payable_unit_price = Some(payable);
    if total_price > payable_total {
        details.deductions.push(Deduction {
            reason: DeductionReason::TariffExceeded { billed, tariff },
            amount: total_price - payable_total,
        });
    }

    let coverage = if !item.is_active {
        Coverage::Uncovered(DeductionReason::NotCovered {
            detail: format!("item {} is inactive", item.code),
        })
    } else {
        let mut diagnoses: BTreeSet<String> = inputs.employee.illness_codes.clone();
        diagnoses.extend(line.diagnosis_code.iter().cloned());
        let context = RestrictionContext {
            history: inputs.history,
            other_invoice_items: inputs.other_items,
            body_part_id: line.body_part_id,
            quantity: line.quantity,
            diagnoses: &diagnoses,
            service_date: inputs.service_date,
        };
        let matched = ConditionMatcher::select(inputs.conditions, &classification, inputs.employee, &context);
        details.rejected_conditions = matched.rejected.clone();

        match matched.selected {
            Some(condition) => apply_condition(condition, line, payable, payable_total, scale, &mut details),
            None => match matched.rejected.iter().rev().find(|r| matches!(r.reason, RejectionReason::Restricted(_))) {
                Some(rejected) => Coverage::Uncovered(DeductionReason::RestrictionViolated {
                    condition: rejected.condition_name.clone(),
                    detail: match &rejected.reason {
                        RejectionReason::Restricted(violation) => violation.to_string(),
                        RejectionReason::Ineligible(failure) => failure.to_string(),
                    },
                }),
                None if item.is_covered => {
                    let insurance_share = price.insurer_share.apply(payable_total).round_to_scale(scale);
                    details.covered_quantity = line.quantity;
                    details.covered_base = payable_total;
                    details.coverage_source = CoverageSource::BasePrice { price_id: price.id };
                    details.coverage_percentage = price.insurer_share;
                    details.raw_insurance_share = insurance_share;
                    Coverage::Covered {
                        insurance_share,
                        percentage: price.insurer_share,
                        condition_id: None,
                    }
                }
                None => Coverage::Uncovered(DeductionReason::NotCovered {
                    detail: format!("item {} is not covered by the plan", item.code),
                }),
            },
        }
    };

    let mut coverage = coverage;
    if let Coverage::Covered { insurance_share, .. } = &coverage {
        let requested = *insurance_share;
        if requested.is_positive() {
            if let Err(breach) = ConditionGroupTracker::check(
                inputs.groups,
                &classification,
                inputs.history,
                requested,
                inputs.service_date,
            ) {
                let detail = breach.to_string();
                details.group_breach = Some(breach);
                coverage = Coverage::Uncovered(DeductionReason::GroupCapExceeded { detail });
            }
        }
    }

    let (insurance_requested, coverage_percentage, status, applied_condition_id) = match coverage {
        Coverage::Covered { insurance_share, percentage, condition_id } => {
            (insurance_share, percentage, LineStatus::Covered, condition_id)
        }
        Coverage::NotApproved { condition_id, condition } => {
            details.deductions = vec![Deduction {
                reason: DeductionReason::PreApprovalRequired { condition },
                amount: total_price,
            }];
            (Money::zero(), Percentage::ZERO, LineStatus::NotApproved, Some(condition_id))
        }
        Coverage::Uncovered(reason) => {
            details.deductions = vec![Deduction { reason, amount: total_price }];
            details.coverage_source = CoverageSource::Uncovered;
            (Money::zero(), Percentage::ZERO, LineStatus::Uncovered, None)
        }
    };

    let discount = DiscountAggregator::aggregate(
        inputs.discounts,
        inputs.employee,
        &classification,
        line.quantity,
        total_price - insurance_requested,
        inputs.service_date,
        scale,
    );

    PricedLine {
        line_no: inputs.line_no,
        item: classification,
        body_part_id: line.body_part_id,
        quantity: line.quantity,
        unit_price: billed,
        total_price,
        insurance_requested,
        coverage_percentage,
        discount,
        status,
        applied_condition_id,
        details,
    }
}

fn apply_condition(
    condition: &ItemPriceCondition,
    line: &AdjudicationLine,
    payable: Money,
    payable_total: Money,
    scale: u32,
    details: &mut PricingDetails,
) -> Coverage {
    let percentage = condition.effective_coverage();
    details.coverage_source = CoverageSource::Condition {
        condition_id: condition.id,
        name: condition.name.clone(),
    };
    details.coverage_percentage = percentage;

    if condition.requires_pre_approval && !line.pre_approved {
        return Coverage::NotApproved {
            condition_id: condition.id,
            condition: condition.name.clone(),
        };
    }

    let covered_quantity = condition.max_quantity.map_or(line.quantity, |max| line.quantity.min(max));
    let covered_base = payable.multiply(Decimal::from(covered_quantity)).round_to_scale(scale);
    if let Some(max_quantity) = condition.max_quantity.filter(|_| covered_quantity < line.quantity) {
        details.deductions.push(Deduction {
            reason: DeductionReason::QuantityCap { max_quantity, requested: line.quantity },
            amount: payable_total - covered_base,
        });
    }

    let raw = percentage.apply(covered_base).round_to_scale(scale);
    let insurance_share = match condition.max_covered_amount {
        Some(cap) if raw > cap => {
            details.deductions.push(Deduction {
                reason: DeductionReason::MaxCoveredAmount { cap },
                amount: raw - cap,
            });
            cap
        }
        _ => raw,
    };

    details.covered_quantity = covered_quantity;
    details.covered_base = covered_base;
    details.raw_insurance_share = raw;

    Coverage::Covered {
        insurance_share,
        percentage,
        condition_id: Some(condition.id),
    }
}
