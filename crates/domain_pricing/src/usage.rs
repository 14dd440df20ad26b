//! Usage history consulted by restrictions and group caps

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{BodyPartId, ConditionId, DateWindow, InvoiceId, Money};

use crate::catalog::ItemClassification;

/// One adjudicated invoice line, as seen by later adjudications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub invoice_id: InvoiceId,
    pub item: ItemClassification,
    pub applied_condition_id: Option<ConditionId>,
    pub body_part_id: Option<BodyPartId>,
    pub quantity: u32,
    pub insurance_share: Money,
    pub service_date: NaiveDate,
    pub is_covered: bool,
}

/// Prior usage for one employee
///
/// Holds persisted lines from other invoices plus, during adjudication, the
/// lines of the current invoice already priced in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageHistory {
    records: Vec<UsageRecord>,
}

impl UsageHistory {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: UsageRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose service date falls inside `window`
    pub fn in_window(&self, window: DateWindow) -> impl Iterator<Item = &UsageRecord> {
        self.records.iter().filter(move |r| window.contains(r.service_date))
    }

    /// Covered records inside `window`
    pub fn covered_in_window(&self, window: DateWindow) -> impl Iterator<Item = &UsageRecord> {
        self.in_window(window).filter(|r| r.is_covered)
    }
}

impl FromIterator<UsageRecord> for UsageHistory {
    fn from_iter<I: IntoIterator<Item = UsageRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
