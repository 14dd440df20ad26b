//! Invoice Adjudication Domain
//!
//! Splits every invoice line between insurer and patient and keeps the
//! annual ceiling in step with the invoice lifecycle.
//!
//! # Invoice Lifecycle
//!
//! ```text
//! Draft -> Calculated (recalculable) -> Submitted -> Approved/Rejected
//! Draft/Calculated -> Cancelled
//! ```
//!
//! Calculation debits the ceiling per line; rejection and cancellation
//! credit the debits back.

pub mod line;
pub mod outcome;
pub mod invoice;
pub mod adjudicator;
pub mod service;
pub mod locks;
pub mod ports;
pub mod settings;
pub mod error;

pub use line::{AdjudicationLine, LineInputs, LineStatus, PricedLine, price_line};
pub use outcome::{
    AdjudicationMode, AdjudicationResult, CeilingTrace, CoverageSource, Deduction, DeductionReason,
    InvoiceTotals, ItemOutcome, PricingDetails,
};
pub use invoice::{Invoice, InvoiceLine, InvoiceStatus};
pub use adjudicator::{AdjudicationRequest, InvoiceAdjudicator};
pub use service::InvoiceService;
pub use locks::InvoiceLocks;
pub use ports::{EmployeePort, InvoicePort, UsageHistoryPort};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{MockEmployeeDirectory, MockInvoiceStore};
pub use settings::{AdjudicationSettings, SETTLEMENT_SCALE};
pub use error::AdjudicationError;
