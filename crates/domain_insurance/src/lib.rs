//! Insurance Domain
//!
//! Policies carry an annual ceiling tracked as `used_amount` and
//! `remaining_amount`. The [`CeilingLedger`] is the only writer of those
//! fields: every debit or credit is an audited compare-and-swap scoped to
//! one policy, and every invoice debit is kept as a reversible
//! [`LedgerEntry`].

pub mod insurance;
pub mod history;
pub mod ledger;
pub mod ports;
pub mod error;

pub use insurance::{Insurance, CeilingBalance};
pub use history::{InsuranceHistory, LedgerEntry, LedgerField};
pub use ledger::{CeilingLedger, DebitRequest, DebitOutcome, CreditOutcome, grant, DEFAULT_MAX_RETRIES};
pub use ports::{CeilingStore, CeilingChange, CommitOutcome};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockCeilingStore;
pub use error::LedgerError;
