//! Audit rows and ledger entries
//!
//! Each ceiling write appends one `InsuranceHistory` row per changed field.
//! Debits are also recorded as `LedgerEntry` rows keyed by invoice so that a
//! recalculation or cancellation can reverse exactly what the invoice took.
//! Entries are never deleted; reversal stamps `reversed_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, InsuranceHistoryId, InsuranceId, InvoiceId, LedgerEntryId, Money};

/// Ceiling field an audit row refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    UsedAmount,
    RemainingAmount,
}

impl LedgerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerField::UsedAmount => "used_amount",
            LedgerField::RemainingAmount => "remaining_amount",
        }
    }
}

impl fmt::Display for LedgerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "used_amount" => Ok(LedgerField::UsedAmount),
            "remaining_amount" => Ok(LedgerField::RemainingAmount),
            other => Err(CoreError::validation(format!("unknown ledger field '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceHistory {
    pub id: InsuranceHistoryId,
    pub insurance_id: InsuranceId,
    pub field: LedgerField,
    pub old_value: Money,
    pub new_value: Money,
    pub actor: String,
    pub reason: String,
    pub invoice_id: Option<InvoiceId>,
    pub recorded_at: DateTime<Utc>,
}

impl InsuranceHistory {
    /// The pair of rows describing one ceiling write
    pub fn pair(
        insurance_id: InsuranceId,
        used: (Money, Money),
        remaining: (Money, Money),
        actor: &str,
        reason: &str,
        invoice_id: Option<InvoiceId>,
    ) -> [InsuranceHistory; 2] {
        let recorded_at = Utc::now();
        let row = |field: LedgerField, (old_value, new_value): (Money, Money)| InsuranceHistory {
            id: InsuranceHistoryId::new(),
            insurance_id,
            field,
            old_value,
            new_value,
            actor: actor.to_string(),
            reason: reason.to_string(),
            invoice_id,
            recorded_at,
        };
        [row(LedgerField::UsedAmount, used), row(LedgerField::RemainingAmount, remaining)]
    }
}

/// One ceiling debit taken by an invoice line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub insurance_id: InsuranceId,
    pub invoice_id: InvoiceId,
    pub line_no: u32,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn new(insurance_id: InsuranceId, invoice_id: InvoiceId, line_no: u32, amount: Money) -> Self {
        Self {
            id: LedgerEntryId::new(),
            insurance_id,
            invoice_id,
            line_no,
            amount,
            recorded_at: Utc::now(),
            reversed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.reversed_at.is_none()
    }
}
