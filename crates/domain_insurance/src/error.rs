//! Insurance domain errors

use thiserror::Error;

use core_kernel::{InsuranceId, Money, PortError};

/// Errors raised by the ceiling ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Every compare-and-swap attempt observed a stale version
    #[error("Concurrent ledger conflict on insurance {insurance_id} after {attempts} attempts")]
    ConcurrentLedgerConflict {
        insurance_id: InsuranceId,
        attempts: u32,
    },

    #[error("Insurance not found: {0}")]
    InsuranceNotFound(InsuranceId),

    #[error("Ledger amounts must not be negative, got {0}")]
    NegativeAmount(Money),

    /// Stored ceiling fields are inconsistent
    #[error("Ceiling invariant violated on insurance {insurance_id}: {message}")]
    InvariantViolated {
        insurance_id: InsuranceId,
        message: String,
    },

    #[error(transparent)]
    Port(PortError),
}

impl LedgerError {
    /// True if a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::ConcurrentLedgerConflict { .. } => true,
            LedgerError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<PortError> for LedgerError {
    fn from(error: PortError) -> Self {
        LedgerError::Port(error)
    }
}
