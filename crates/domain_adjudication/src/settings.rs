//! Adjudication settings
//!
//! Plain values handed in by the composition root; the domain never reads
//! the environment.

use serde::{Deserialize, Serialize};

use domain_insurance::DEFAULT_MAX_RETRIES;

/// Decimal places of settled amounts
pub const SETTLEMENT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationSettings {
    /// Compare-and-swap retries per ceiling operation
    pub ledger_max_retries: u32,
    /// Rounding scale for shares and discounts
    pub rounding_scale: u32,
    /// Actor recorded when no user is attached to an operation
    pub system_actor: String,
}

impl Default for AdjudicationSettings {
    fn default() -> Self {
        Self {
            ledger_max_retries: DEFAULT_MAX_RETRIES,
            rounding_scale: SETTLEMENT_SCALE,
            system_actor: "system".to_string(),
        }
    }
}
