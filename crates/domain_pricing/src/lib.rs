//! Pricing Rules Domain
//!
//! This crate holds the reference-data model and the rule components the
//! adjudication engine composes for every invoice line:
//!
//! ```text
//! PriceResolver ─► ConditionMatcher (EligibilityFilter + RestrictionChecker)
//!               ─► ConditionGroupTracker ─► DiscountAggregator
//! InteractionScreener runs once per invoice, independent of pricing.
//! ```
//!
//! Every component is a pure function of its inputs and an explicit as-of
//! date. Loading the inputs is the job of [`ports::PricingCatalogPort`].

pub mod catalog;
pub mod price;
pub mod employee;
pub mod condition;
pub mod eligibility;
pub mod usage;
pub mod restriction;
pub mod matcher;
pub mod group;
pub mod discount;
pub mod interaction;
pub mod ports;
pub mod error;

pub use catalog::{Item, ItemKind, ItemPrice, ItemClassification, ItemSelector};
pub use price::PriceResolver;
pub use employee::{EmployeeContext, Gender, RelationType};
pub use condition::{
    ItemPriceCondition, ConditionFilter, FilterType, FilterOperator,
    ConditionRestriction, RestrictionKind,
};
pub use eligibility::{EligibilityFilter, EligibilityFailure, EligibilityReport, EvaluationMode};
pub use usage::{UsageRecord, UsageHistory};
pub use restriction::{RestrictionChecker, RestrictionContext, RestrictionViolation};
pub use matcher::{ConditionMatcher, ConditionMatch, RejectedCondition, RejectionReason};
pub use group::{ConditionGroup, ConditionGroupTracker, GroupCapBreach, GroupCapKind};
pub use discount::{
    Discount, DiscountKind, DiscountScope, DiscountAggregator, AppliedDiscount, DiscountBreakdown,
};
pub use interaction::{DrugInteraction, InteractionSeverity, InteractionScreener, InteractionAlert};
pub use ports::{PricingCatalogPort, CatalogSnapshot};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockPricingCatalog;
pub use error::PricingError;
