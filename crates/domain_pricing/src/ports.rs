//! Pricing Catalog Port
//!
//! Read-only access to the reference data the rule components consume. The
//! engine never writes back into reference data; administrators maintain
//! it through a separate surface.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_pricing::ports::PricingCatalogPort;
//! use std::sync::Arc;
//!
//! pub struct InvoiceAdjudicator {
//!     catalog: Arc<dyn PricingCatalogPort>,
//! }
//! ```
//!
//! Lookups return the full history of each record kind for an item; the
//! as-of filtering is always done by the rule components so results are
//! reproducible for past service dates.

use async_trait::async_trait;

use core_kernel::{ConditionId, DomainPort, HealthCheckable, ItemId, PortError};

use crate::catalog::{Item, ItemClassification, ItemPrice};
use crate::condition::ItemPriceCondition;
use crate::discount::Discount;
use crate::employee::EmployeeContext;
use crate::group::ConditionGroup;
use crate::interaction::DrugInteraction;

#[async_trait]
pub trait PricingCatalogPort: DomainPort + HealthCheckable {
    /// Retrieves an item, or `PortError::NotFound`
    async fn get_item(&self, id: ItemId) -> Result<Item, PortError>;

    /// Every price record of the item regardless of lifecycle
    async fn item_prices(&self, item_id: ItemId) -> Result<Vec<ItemPrice>, PortError>;

    /// Conditions whose scope matches the item, with filters and restrictions
    async fn conditions_for(&self, item: &ItemClassification) -> Result<Vec<ItemPriceCondition>, PortError>;

    async fn get_condition(&self, id: ConditionId) -> Result<ItemPriceCondition, PortError>;

    /// Groups that contain the item
    async fn groups_for(&self, item: &ItemClassification) -> Result<Vec<ConditionGroup>, PortError>;

    /// Discounts that may apply to the employee and item
    ///
    /// Adapters may over-fetch; `DiscountAggregator` makes the final decision.
    async fn discounts_for(
        &self,
        employee: &EmployeeContext,
        item: &ItemClassification,
    ) -> Result<Vec<Discount>, PortError>;

    /// Interactions with both endpoints among `item_ids`
    async fn interactions_among(&self, item_ids: &[ItemId]) -> Result<Vec<DrugInteraction>, PortError>;
}

/// An in-memory copy of reference data
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub items: Vec<Item>,
    pub prices: Vec<ItemPrice>,
    pub conditions: Vec<ItemPriceCondition>,
    pub groups: Vec<ConditionGroup>,
    pub discounts: Vec<Discount>,
    pub interactions: Vec<DrugInteraction>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_price(mut self, price: ItemPrice) -> Self {
        self.prices.push(price);
        self
    }

    pub fn with_condition(mut self, condition: ItemPriceCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discounts.push(discount);
        self
    }

    pub fn with_interaction(mut self, interaction: DrugInteraction) -> Self {
        self.interactions.push(interaction);
        self
    }
}

/// Mock implementation of PricingCatalogPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::HealthCheckResult;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Serves a `CatalogSnapshot` from memory
    #[derive(Debug, Default, Clone)]
    pub struct MockPricingCatalog {
        snapshot: Arc<RwLock<CatalogSnapshot>>,
    }

    impl MockPricingCatalog {
        pub fn new(snapshot: CatalogSnapshot) -> Self {
            Self {
                snapshot: Arc::new(RwLock::new(snapshot)),
            }
        }

        /// Replaces reference data between adjudications
        pub async fn update<F>(&self, f: F)
        where
            F: FnOnce(&mut CatalogSnapshot),
        {
            f(&mut *self.snapshot.write().await);
        }
    }

    impl DomainPort for MockPricingCatalog {}

    #[async_trait]
    impl HealthCheckable for MockPricingCatalog {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-pricing-catalog", 0)
        }
    }

    #[async_trait]
    impl PricingCatalogPort for MockPricingCatalog {
        async fn get_item(&self, id: ItemId) -> Result<Item, PortError> {
            self.snapshot
                .read()
                .await
                .items
                .iter()
                .find(|i| i.id == id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Item", id))
        }

        async fn item_prices(&self, item_id: ItemId) -> Result<Vec<ItemPrice>, PortError> {
            let snapshot = self.snapshot.read().await;
            Ok(snapshot.prices.iter().filter(|p| p.item_id == item_id).cloned().collect())
        }

        async fn conditions_for(&self, item: &ItemClassification) -> Result<Vec<ItemPriceCondition>, PortError> {
            let snapshot = self.snapshot.read().await;
            Ok(snapshot
                .conditions
                .iter()
                .filter(|c| c.scope.matches(item))
                .cloned()
                .collect())
        }

        async fn get_condition(&self, id: ConditionId) -> Result<ItemPriceCondition, PortError> {
            self.snapshot
                .read()
                .await
                .conditions
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| PortError::not_found("ItemPriceCondition", id))
        }

        async fn groups_for(&self, item: &ItemClassification) -> Result<Vec<ConditionGroup>, PortError> {
            let snapshot = self.snapshot.read().await;
            Ok(snapshot.groups.iter().filter(|g| g.contains(item)).cloned().collect())
        }

        async fn discounts_for(
            &self,
            _employee: &EmployeeContext,
            _item: &ItemClassification,
        ) -> Result<Vec<Discount>, PortError> {
            Ok(self.snapshot.read().await.discounts.clone())
        }

        async fn interactions_among(&self, item_ids: &[ItemId]) -> Result<Vec<DrugInteraction>, PortError> {
            let snapshot = self.snapshot.read().await;
            Ok(snapshot
                .interactions
                .iter()
                .filter(|i| item_ids.contains(&i.item_a) && item_ids.contains(&i.item_b))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPricingCatalog;
    use super::*;
    use crate::catalog::ItemKind;
    use core_kernel::CategoryId;

    fn item() -> Item {
        Item {
            id: ItemId::new(),
            code: "DRG-001".to_string(),
            name: "Amoxicillin 500mg".to_string(),
            kind: ItemKind::Drug,
            category_id: CategoryId::new(),
            sub_category_id: None,
            group_id: None,
            is_covered: true,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_mock_catalog_lookup() {
        let known = item();
        let catalog = MockPricingCatalog::new(CatalogSnapshot::new().with_item(known.clone()));

        assert_eq!(catalog.get_item(known.id).await.unwrap(), known);
        assert!(catalog.get_item(ItemId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_catalog_update() {
        let catalog = MockPricingCatalog::new(CatalogSnapshot::new());
        let added = item();
        let id = added.id;
        catalog.update(move |s| s.items.push(added)).await;
        assert!(catalog.get_item(id).await.is_ok());
    }
}
