//! Strongly-typed identifiers for catalog, rule, policy, and invoice entities
//!
//! Newtype wrappers around UUIDs keep a condition id from being passed where
//! an item id is expected. Identifiers are ordered so they can serve as the
//! final deterministic tie-break when rules are otherwise equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Display prefix, e.g. `ITM` for items
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(raw)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Catalog
define_id!(ItemId, "ITM");
define_id!(CategoryId, "CAT");
define_id!(SubCategoryId, "SUB");
define_id!(ItemGroupId, "GRP");
define_id!(ItemPriceId, "PRC");
define_id!(BodyPartId, "BDY");

// Pricing rules
define_id!(ConditionId, "CND");
define_id!(ConditionFilterId, "FLT");
define_id!(RestrictionId, "RST");
define_id!(ConditionGroupId, "CGR");
define_id!(DiscountId, "DSC");
define_id!(InteractionId, "DDI");

// Insured parties and policies
define_id!(EmployeeId, "EMP");
define_id!(InsuranceId, "INS");
define_id!(InsuranceHistoryId, "INSH");
define_id!(LedgerEntryId, "LED");

// Invoices
define_id!(InvoiceId, "INV");
define_id!(InvoiceItemId, "INVI");
