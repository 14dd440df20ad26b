//! Price resolution
//!
//! Picks the tariff effective for an item on a service date. Overlapping
//! records are tolerated: among active rows covering the date, the latest
//! `effective_from` wins, and the price id breaks any remaining tie so the
//! choice never depends on load order.

use chrono::NaiveDate;

use core_kernel::ItemId;

use crate::catalog::ItemPrice;
use crate::error::PricingError;

/// Resolves the effective `ItemPrice` for an item
pub struct PriceResolver;

impl PriceResolver {
    /// Returns the price record in force for `item_id` on `as_of`
    ///
    /// # Errors
    ///
    /// `PricingError::NotPriced` when no active record covers the date. This
    /// is not fatal for an invoice: the line is marked uncovered.
    pub fn resolve(
        prices: &[ItemPrice],
        item_id: ItemId,
        as_of: NaiveDate,
    ) -> Result<&ItemPrice, PricingError> {
        prices
            .iter()
            .filter(|p| p.item_id == item_id && p.is_in_force(as_of))
            .max_by(|a, b| {
                a.period
                    .from
                    .cmp(&b.period.from)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .ok_or(PricingError::NotPriced { item_id, as_of })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{EffectivePeriod, ItemPriceId, Lifecycle, Money, Percentage};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(item_id: ItemId, amount: i64, from: NaiveDate, to: Option<NaiveDate>, lifecycle: Lifecycle) -> ItemPrice {
        ItemPrice {
            id: ItemPriceId::new(),
            item_id,
            price: Money::new(amount.into()),
            insurer_share: Percentage::new(dec!(70)).unwrap(),
            patient_share: Percentage::new(dec!(30)).unwrap(),
            period: EffectivePeriod::new(from, to).unwrap(),
            lifecycle,
        }
    }

    #[test]
    fn test_latest_effective_from_wins_on_overlap() {
        let item = ItemId::new();
        let prices = vec![
            price(item, 100, date(2024, 1, 1), None, Lifecycle::Active),
            price(item, 120, date(2024, 3, 1), None, Lifecycle::Active),
            price(item, 150, date(2024, 9, 1), None, Lifecycle::Active),
        ];

        let resolved = PriceResolver::resolve(&prices, item, date(2024, 5, 1)).unwrap();
        assert_eq!(resolved.price.amount(), dec!(120));
    }

    #[test]
    fn test_inactive_rows_are_skipped() {
        let item = ItemId::new();
        let prices = vec![
            price(item, 100, date(2024, 1, 1), None, Lifecycle::Active),
            price(item, 999, date(2024, 2, 1), None, Lifecycle::Retired),
        ];

        let resolved = PriceResolver::resolve(&prices, item, date(2024, 5, 1)).unwrap();
        assert_eq!(resolved.price.amount(), dec!(100));
    }

    #[test]
    fn test_expired_price_is_not_priced() {
        let item = ItemId::new();
        let prices = vec![price(item, 100, date(2023, 1, 1), Some(date(2023, 12, 31)), Lifecycle::Active)];

        let result = PriceResolver::resolve(&prices, item, date(2024, 1, 1));
        assert_eq!(result, Err(PricingError::NotPriced { item_id: item, as_of: date(2024, 1, 1) }));
    }

    #[test]
    fn test_other_items_prices_ignored() {
        let item = ItemId::new();
        let prices = vec![price(ItemId::new(), 100, date(2024, 1, 1), None, Lifecycle::Active)];
        assert!(PriceResolver::resolve(&prices, item, date(2024, 6, 1)).is_err());
    }
}
