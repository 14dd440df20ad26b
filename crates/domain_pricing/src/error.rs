//! Pricing domain errors

use chrono::NaiveDate;
use thiserror::Error;

use core_kernel::ItemId;

/// Errors raised while resolving prices or validating rule definitions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// No active price is effective for the item on the date
    #[error("Item {item_id} has no effective price on {as_of}")]
    NotPriced { item_id: ItemId, as_of: NaiveDate },

    /// A rule definition is internally inconsistent
    #[error("Invalid rule definition: {0}")]
    InvalidRule(String),
}

impl PricingError {
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        PricingError::InvalidRule(message.into())
    }
}
