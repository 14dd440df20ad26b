//! Restriction checks for conditions that passed eligibility
//!
//! Counting restrictions look at covered usage of the same condition inside
//! the calendar period containing the service date. The candidate line is
//! admitted only if `used + requested` stays within the cap. Any violation
//! disqualifies the whole condition.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use core_kernel::{BodyPartId, ItemId, PeriodType};

use crate::condition::{ItemPriceCondition, RestrictionKind};
use crate::usage::{UsageHistory, UsageRecord};

/// Inputs a restriction needs beyond the condition itself
#[derive(Debug, Clone, Copy)]
pub struct RestrictionContext<'a> {
    /// Prior usage, including earlier lines of the current invoice
    pub history: &'a UsageHistory,
    /// Items on the other lines of the current invoice
    pub other_invoice_items: &'a [ItemId],
    pub body_part_id: Option<BodyPartId>,
    pub quantity: u32,
    /// Employee illnesses plus the line's diagnosis
    pub diagnoses: &'a BTreeSet<String>,
    pub service_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum RestrictionViolation {
    ConflictOnInvoice { item_id: ItemId },
    ConflictInPeriod { item_id: ItemId, period: PeriodType },
    BodyPartMissing,
    BodyPartCountExceeded { max_count: u32, used: u32, period: PeriodType },
    CountExceeded { max_count: u32, used: u32, period: PeriodType },
    QuantityExceeded { max_quantity: u32, used: u32, requested: u32, period: PeriodType },
    DiagnosisMissing { required: BTreeSet<String> },
}

impl fmt::Display for RestrictionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestrictionViolation::ConflictOnInvoice { item_id } => {
                write!(f, "conflicts with {} on the same invoice", item_id)
            }
            RestrictionViolation::ConflictInPeriod { item_id, period } => {
                write!(f, "conflicts with {} used in the same {} period", item_id, period)
            }
            RestrictionViolation::BodyPartMissing => {
                write!(f, "body part is required for a per-body-part limit")
            }
            RestrictionViolation::BodyPartCountExceeded { max_count, used, period } => write!(
                f,
                "{} limit of {} per body part reached ({} used)",
                period, max_count, used
            ),
            RestrictionViolation::CountExceeded { max_count, used, period } => {
                write!(f, "{} limit of {} uses reached ({} used)", period, max_count, used)
            }
            RestrictionViolation::QuantityExceeded { max_quantity, used, requested, period } => write!(
                f,
                "{} quantity limit of {} exceeded ({} used, {} requested)",
                period, max_quantity, used, requested
            ),
            RestrictionViolation::DiagnosisMissing { required } => {
                let codes: Vec<&str> = required.iter().map(String::as_str).collect();
                write!(f, "requires one of diagnoses {}", codes.join(", "))
            }
        }
    }
}

pub struct RestrictionChecker;

impl RestrictionChecker {
    /// Checks every restriction of `condition`, failing on the first violation
    pub fn check(
        condition: &ItemPriceCondition,
        ctx: &RestrictionContext<'_>,
    ) -> Result<(), RestrictionViolation> {
        for restriction in &condition.restrictions {
            Self::check_one(condition, &restriction.kind, ctx)?;
        }
        Ok(())
    }

    fn check_one(
        condition: &ItemPriceCondition,
        kind: &RestrictionKind,
        ctx: &RestrictionContext<'_>,
    ) -> Result<(), RestrictionViolation> {
        let same_condition = |r: &&UsageRecord| r.applied_condition_id == Some(condition.id);

        match kind {
            RestrictionKind::ConflictItem { item_id, within } => {
                if ctx.other_invoice_items.contains(item_id) {
                    return Err(RestrictionViolation::ConflictOnInvoice { item_id: *item_id });
                }
                if let Some(period) = within {
                    let window = period.window(ctx.service_date);
                    if ctx.history.in_window(window).any(|r| r.item.item_id == *item_id) {
                        return Err(RestrictionViolation::ConflictInPeriod {
                            item_id: *item_id,
                            period: *period,
                        });
                    }
                }
                Ok(())
            }
            RestrictionKind::MaxPerBodyPart { max_count, period } => {
                let body_part = ctx.body_part_id.ok_or(RestrictionViolation::BodyPartMissing)?;
                let used = count(
                    ctx.history
                        .covered_in_window(period.window(ctx.service_date))
                        .filter(same_condition)
                        .filter(|r| r.body_part_id == Some(body_part)),
                );
                if admits_none(used, *max_count) {
                    return Err(RestrictionViolation::BodyPartCountExceeded {
                        max_count: *max_count,
                        used,
                        period: *period,
                    });
                }
                Ok(())
            }
            RestrictionKind::MaxCount { max_count, period } => {
                let used = count(
                    ctx.history
                        .covered_in_window(period.window(ctx.service_date))
                        .filter(same_condition),
                );
                if admits_none(used, *max_count) {
                    return Err(RestrictionViolation::CountExceeded {
                        max_count: *max_count,
                        used,
                        period: *period,
                    });
                }
                Ok(())
            }
            RestrictionKind::MaxQuantity { max_quantity, period } => {
                let used: u32 = ctx
                    .history
                    .covered_in_window(period.window(ctx.service_date))
                    .filter(same_condition)
                    .map(|r| r.quantity)
                    .fold(0u32, u32::saturating_add);
                if used.saturating_add(ctx.quantity) > *max_quantity {
                    return Err(RestrictionViolation::QuantityExceeded {
                        max_quantity: *max_quantity,
                        used,
                        requested: ctx.quantity,
                        period: *period,
                    });
                }
                Ok(())
            }
            RestrictionKind::RequiredDiagnosis { codes } => {
                if codes.is_disjoint(ctx.diagnoses) {
                    return Err(RestrictionViolation::DiagnosisMissing { required: codes.clone() });
                }
                Ok(())
            }
        }
    }
}

fn count<'a>(records: impl Iterator<Item = &'a UsageRecord>) -> u32 {
    u32::try_from(records.count()).unwrap_or(u32::MAX)
}

/// True when one more use would pass `max_count`
fn admits_none(used: u32, max_count: u32) -> bool {
    used.saturating_add(1) > max_count
}
