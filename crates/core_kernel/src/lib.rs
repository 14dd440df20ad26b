//! Core Kernel - Foundational types for the TPA pricing and adjudication engine
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money and percentage types with precise decimal arithmetic
//! - Effective-date primitives (periods, lifecycle state, calendar windows)
//! - Strongly-typed identifiers
//! - Port error and health-check types for the hexagonal adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Percentage, MoneyError};
pub use temporal::{
    EffectivePeriod, Lifecycle, PeriodType, DateWindow, Timezone, TemporalError,
    age_on, is_in_force,
};
pub use identifiers::{
    ItemId, CategoryId, SubCategoryId, ItemGroupId, ItemPriceId, BodyPartId,
    ConditionId, ConditionFilterId, RestrictionId, ConditionGroupId, DiscountId, InteractionId,
    EmployeeId, InsuranceId, InsuranceHistoryId, LedgerEntryId, InvoiceId, InvoiceItemId,
};
pub use error::CoreError;
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable};
