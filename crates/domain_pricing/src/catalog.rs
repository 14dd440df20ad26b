//! Item catalog and effective-dated item prices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    is_in_force, CategoryId, EffectivePeriod, ItemGroupId, ItemId, ItemPriceId, Lifecycle, Money,
    Percentage, SubCategoryId,
};

use crate::error::PricingError;

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Drug,
    Service,
    Device,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Drug => "drug",
            ItemKind::Service => "service",
            ItemKind::Device => "device",
        }
    }
}

impl FromStr for ItemKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drug" => Ok(ItemKind::Drug),
            "service" => Ok(ItemKind::Service),
            "device" => Ok(ItemKind::Device),
            other => Err(PricingError::invalid_rule(format!("unknown item kind '{}'", other))),
        }
    }
}

/// The classification keys rules are scoped by
///
/// Carried by both catalog items and historical usage records so that
/// condition scopes, group membership, and discount scopes can be matched
/// against either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemClassification {
    pub item_id: ItemId,
    pub category_id: CategoryId,
    pub sub_category_id: Option<SubCategoryId>,
    pub group_id: Option<ItemGroupId>,
}

/// A catalog entry: drug, service, or device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub kind: ItemKind,
    pub category_id: CategoryId,
    pub sub_category_id: Option<SubCategoryId>,
    pub group_id: Option<ItemGroupId>,
    /// Whether the plain tariff shares apply when no condition matches
    pub is_covered: bool,
    pub is_active: bool,
}

impl Item {
    pub fn classification(&self) -> ItemClassification {
        ItemClassification {
            item_id: self.id,
            category_id: self.category_id,
            sub_category_id: self.sub_category_id,
            group_id: self.group_id,
        }
    }
}

/// Scope a rule or cap is attached to
///
/// Specificity orders item over sub-category over category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum ItemSelector {
    Item(ItemId),
    SubCategory(SubCategoryId),
    Category(CategoryId),
}

impl ItemSelector {
    pub fn matches(&self, item: &ItemClassification) -> bool {
        match self {
            ItemSelector::Item(id) => item.item_id == *id,
            ItemSelector::SubCategory(id) => item.sub_category_id == Some(*id),
            ItemSelector::Category(id) => item.category_id == *id,
        }
    }

    /// Higher is more specific
    pub fn specificity(&self) -> u8 {
        match self {
            ItemSelector::Item(_) => 3,
            ItemSelector::SubCategory(_) => 2,
            ItemSelector::Category(_) => 1,
        }
    }
}

impl fmt::Display for ItemSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSelector::Item(id) => write!(f, "item {}", id),
            ItemSelector::SubCategory(id) => write!(f, "sub-category {}", id),
            ItemSelector::Category(id) => write!(f, "category {}", id),
        }
    }
}

/// Tariff record for an item over an effective period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub id: ItemPriceId,
    pub item_id: ItemId,
    /// Unit tariff
    pub price: Money,
    pub insurer_share: Percentage,
    pub patient_share: Percentage,
    pub period: EffectivePeriod,
    pub lifecycle: Lifecycle,
}

impl ItemPrice {
    pub fn is_in_force(&self, as_of: chrono::NaiveDate) -> bool {
        is_in_force(self.lifecycle, &self.period, as_of)
    }

    /// Checks that the two shares add up to 100%
    pub fn validate(&self) -> Result<(), PricingError> {
        if self.insurer_share.value() + self.patient_share.value() != rust_decimal::Decimal::ONE_HUNDRED {
            return Err(PricingError::invalid_rule(format!(
                "price {} shares {} + {} do not sum to 100%",
                self.id, self.insurer_share, self.patient_share
            )));
        }
        if self.price.is_negative() {
            return Err(PricingError::invalid_rule(format!("price {} is negative", self.id)));
        }
        Ok(())
    }
}
