//! Adjudication domain errors
//!
//! Only data-integrity and infrastructure failures are errors. Rule
//! outcomes (unpriced items, failed eligibility, exhausted ceilings) are
//! reported on the line as [`crate::outcome::DeductionReason`] values.

use thiserror::Error;

use core_kernel::{InsuranceId, InvoiceId, ItemId, Money, PortError};
use domain_insurance::LedgerError;

#[derive(Debug, Error)]
pub enum AdjudicationError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Insurance not found: {0}")]
    InsuranceNotFound(InsuranceId),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invoice {invoice_id} holds {held} of ceiling debits against an insurer share of {expected}; recalculate it")]
    StaleCalculation {
        invoice_id: InvoiceId,
        expected: Money,
        held: Money,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

impl AdjudicationError {
    pub fn validation(message: impl Into<String>) -> Self {
        AdjudicationError::Validation(message.into())
    }

    /// True if retrying the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AdjudicationError::Ledger(e) => e.is_transient(),
            AdjudicationError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<LedgerError> for AdjudicationError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsuranceNotFound(id) => AdjudicationError::InsuranceNotFound(id),
            other => AdjudicationError::Ledger(other),
        }
    }
}
