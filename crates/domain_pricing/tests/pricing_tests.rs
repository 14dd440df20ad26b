//! Integration tests for domain_pricing

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;

use core_kernel::{
    CategoryId, ConditionId, DiscountId, EffectivePeriod, EmployeeId, InsuranceId, InvoiceId,
    ItemId, ItemPriceId, Lifecycle, Money, Percentage, PeriodType, RestrictionId,
};

use domain_pricing::{
    ConditionMatcher, ConditionRestriction, Discount, DiscountAggregator, DiscountKind, DiscountScope,
    EmployeeContext, ItemClassification, ItemPrice, ItemPriceCondition, ItemSelector, PriceResolver,
    RelationType, RestrictionChecker, RestrictionContext, RestrictionKind, UsageHistory, UsageRecord,
};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn employee() -> EmployeeContext {
    EmployeeContext {
        employee_id: EmployeeId::new(),
        insurance_id: InsuranceId::new(),
        birth_date: Some(NaiveDate::from_ymd_opt(1985, 7, 14).unwrap()),
        gender: None,
        relation: RelationType::Policyholder,
        province_code: Some("TEH".to_string()),
        location_code: None,
        employee_code: Some("CEC-01".to_string()),
        special_type: None,
        illness_codes: BTreeSet::new(),
        policy_start_date: base_date(),
    }
}

fn classification() -> ItemClassification {
    ItemClassification {
        item_id: ItemId::new(),
        category_id: CategoryId::new(),
        sub_category_id: None,
        group_id: None,
    }
}

fn capped_condition(item: &ItemClassification, max_count: u32, period: PeriodType) -> ItemPriceCondition {
    ItemPriceCondition {
        id: ConditionId::new(),
        name: "Capped visits".to_string(),
        scope: ItemSelector::Item(item.item_id),
        coverage: Percentage::new(dec!(90)).unwrap(),
        patient_share_override: None,
        max_covered_amount: None,
        max_quantity: None,
        requires_pre_approval: false,
        min_age: None,
        max_age: None,
        gender: None,
        relation: None,
        waiting_days: None,
        priority: 0,
        period: EffectivePeriod::starting(base_date()),
        lifecycle: Lifecycle::Active,
        filters: vec![],
        restrictions: vec![ConditionRestriction {
            id: RestrictionId::new(),
            kind: RestrictionKind::MaxCount { max_count, period },
        }],
    }
}

// ============================================================================
// Price Resolution
// ============================================================================

mod price_resolution_tests {
    use super::*;

    fn price_starting(item_id: ItemId, offset_days: u64) -> ItemPrice {
        ItemPrice {
            id: ItemPriceId::new(),
            item_id,
            price: Money::new(Decimal::from(1000 + offset_days)),
            insurer_share: Percentage::new(dec!(70)).unwrap(),
            patient_share: Percentage::new(dec!(30)).unwrap(),
            period: EffectivePeriod::starting(base_date() + Days::new(offset_days)),
            lifecycle: Lifecycle::Active,
        }
    }

    proptest! {
        #[test]
        fn resolves_latest_effective_from_not_after_date(
            offsets in prop::collection::vec(0u64..365, 1..8),
            query_offset in 0u64..400,
        ) {
            let item = ItemId::new();
            let prices: Vec<ItemPrice> = offsets.iter().map(|o| price_starting(item, *o)).collect();
            let as_of = base_date() + Days::new(query_offset);

            let expected_from = offsets.iter().filter(|o| **o <= query_offset).max();
            match (PriceResolver::resolve(&prices, item, as_of), expected_from) {
                (Ok(resolved), Some(offset)) => {
                    prop_assert_eq!(resolved.period.from, base_date() + Days::new(*offset));
                }
                (Err(_), None) => {}
                (got, expected) => prop_assert!(false, "got {:?}, expected offset {:?}", got, expected),
            }
        }
    }

    #[test]
    fn test_resolution_independent_of_load_order() {
        let item = ItemId::new();
        let mut prices = vec![price_starting(item, 10), price_starting(item, 10), price_starting(item, 3)];
        let first = PriceResolver::resolve(&prices, item, base_date() + Days::new(20)).unwrap().id;
        prices.reverse();
        let second = PriceResolver::resolve(&prices, item, base_date() + Days::new(20)).unwrap().id;
        assert_eq!(first, second);
    }
}

// ============================================================================
// Usage Caps
// ============================================================================

mod usage_cap_tests {
    use super::*;

    fn record(item: &ItemClassification, condition_id: ConditionId, on: NaiveDate) -> UsageRecord {
        UsageRecord {
            invoice_id: InvoiceId::new(),
            item: *item,
            applied_condition_id: Some(condition_id),
            body_part_id: None,
            quantity: 1,
            insurance_share: Money::new(dec!(100)),
            service_date: on,
            is_covered: true,
        }
    }

    proptest! {
        #[test]
        fn the_use_after_the_cap_is_always_rejected(max_count in 1u32..12, day in 0u64..20) {
            let item = classification();
            let condition = capped_condition(&item, max_count, PeriodType::Monthly);
            let service_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Days::new(day);
            let diagnoses = BTreeSet::new();
            let mut history = UsageHistory::default();

            for n in 0..=max_count {
                let ctx = RestrictionContext {
                    history: &history,
                    other_invoice_items: &[],
                    body_part_id: None,
                    quantity: 1,
                    diagnoses: &diagnoses,
                    service_date,
                };
                let admitted = RestrictionChecker::check(&condition, &ctx).is_ok();
                prop_assert_eq!(admitted, n < max_count, "use {} of cap {}", n + 1, max_count);
                if admitted {
                    history.push(record(&item, condition.id, service_date));
                }
            }
        }
    }

    #[test]
    fn test_exhausted_condition_falls_through_to_next_candidate() {
        let item = classification();
        let capped = capped_condition(&item, 1, PeriodType::Yearly);
        let mut fallback = capped_condition(&item, 100, PeriodType::Yearly);
        fallback.scope = ItemSelector::Category(item.category_id);
        fallback.coverage = Percentage::new(dec!(50)).unwrap();
        let conditions = vec![capped.clone(), fallback.clone()];

        let history: UsageHistory = vec![record(&item, capped.id, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())]
            .into_iter()
            .collect();
        let diagnoses = BTreeSet::new();
        let ctx = RestrictionContext {
            history: &history,
            other_invoice_items: &[],
            body_part_id: None,
            quantity: 1,
            diagnoses: &diagnoses,
            service_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };

        let matched = ConditionMatcher::select(&conditions, &item, &employee(), &ctx);
        assert_eq!(matched.selected.map(|c| c.id), Some(fallback.id));
        assert!(matched.last_violation().is_some());
    }
}

// ============================================================================
// Discount Stacking
// ============================================================================

mod discount_tests {
    use super::*;

    fn set_discount(item: &ItemClassification, pct: u32, cap: Option<u32>) -> Discount {
        Discount {
            id: DiscountId::new(),
            name: format!("{}% promo", pct),
            kind: DiscountKind::ItemSet { scope: DiscountScope::Item(item.item_id), min_quantity: 1 },
            percentage: Percentage::new(Decimal::from(pct)).unwrap(),
            max_amount: cap.map(|c| Money::new(Decimal::from(c))),
            period: EffectivePeriod::starting(base_date()),
            lifecycle: Lifecycle::Active,
        }
    }

    proptest! {
        #[test]
        fn total_never_exceeds_patient_share_or_sum_of_caps(
            patient_cents in 0i64..1_000_000_000,
            specs in prop::collection::vec((0u32..=100, prop::option::of(0u32..500_000)), 0..6),
        ) {
            let item = classification();
            let discounts: Vec<Discount> = specs.iter().map(|(p, c)| set_discount(&item, *p, *c)).collect();
            let patient_share = Money::new(Decimal::new(patient_cents, 2));

            let breakdown = DiscountAggregator::aggregate(
                &discounts, &employee(), &item, 1, patient_share, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 2,
            );

            prop_assert!(breakdown.total <= patient_share);
            prop_assert!(!breakdown.total.is_negative());
            if specs.iter().all(|(_, c)| c.is_some()) {
                let caps: Money = specs.iter().filter_map(|(_, c)| *c).map(|c| Money::new(Decimal::from(c))).sum();
                prop_assert!(breakdown.total <= caps);
            }
        }
    }

    #[test]
    fn test_breakdown_is_ordered_by_discount_id() {
        let item = classification();
        let discounts = vec![set_discount(&item, 5, None), set_discount(&item, 10, None), set_discount(&item, 15, None)];
        let breakdown = DiscountAggregator::aggregate(
            &discounts, &employee(), &item, 1, Money::new(dec!(1000)), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 2,
        );
        let ids: Vec<DiscountId> = breakdown.applied.iter().map(|a| a.discount_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(breakdown.total, Money::new(dec!(300)));
    }
}
