//! Invoice Adjudicator
//!
//! Prices every line of an invoice in line order, settles each line
//! against the annual ceiling and aggregates the totals. Interaction
//! screening runs once over the whole item list and never changes pricing.
//!
//! In commit mode every open debit the invoice already holds is reversed
//! before pricing starts, so recalculating an unchanged invoice debits the
//! ceiling exactly once.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{InvoiceId, ItemId, Money, PeriodType};
use domain_insurance::{grant, CeilingLedger, DebitRequest};
use domain_pricing::{
    ConditionGroup, Discount, EmployeeContext, InteractionScreener, Item, ItemPrice,
    ItemPriceCondition, PricingCatalogPort, UsageHistory,
};

use crate::error::AdjudicationError;
use crate::line::{price_line, AdjudicationLine, LineInputs, PricedLine};
use crate::outcome::{AdjudicationMode, AdjudicationResult, CeilingTrace, InvoiceTotals, ItemOutcome};
use crate::ports::UsageHistoryPort;
use crate::settings::AdjudicationSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjudicationRequest {
    pub invoice_id: InvoiceId,
    pub employee: EmployeeContext,
    pub service_date: NaiveDate,
    /// In persisted line order
    pub lines: Vec<AdjudicationLine>,
    pub mode: AdjudicationMode,
    pub actor: String,
}

/// Reference data for one distinct item on the invoice
struct ItemRules {
    item: Item,
    prices: Vec<ItemPrice>,
    conditions: Vec<ItemPriceCondition>,
    groups: Vec<ConditionGroup>,
    discounts: Vec<Discount>,
}

/// Ceiling source for one run
enum CeilingMode {
    Commit,
    Preview { remaining: Money },
}

#[derive(Clone)]
pub struct InvoiceAdjudicator {
    catalog: Arc<dyn PricingCatalogPort>,
    usage: Arc<dyn UsageHistoryPort>,
    ledger: CeilingLedger,
    settings: AdjudicationSettings,
}

impl InvoiceAdjudicator {
    pub fn new(
        catalog: Arc<dyn PricingCatalogPort>,
        usage: Arc<dyn UsageHistoryPort>,
        ledger: CeilingLedger,
        settings: AdjudicationSettings,
    ) -> Self {
        let ledger = ledger.with_max_retries(settings.ledger_max_retries);
        Self { catalog, usage, ledger, settings }
    }

    pub fn ledger(&self) -> &CeilingLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &AdjudicationSettings {
        &self.settings
    }

    /// Adjudicates every line of the request
    ///
    /// # Errors
    ///
    /// Only integrity and infrastructure failures: an unknown item or
    /// policy, an invalid request, an exhausted ledger retry budget or a
    /// port failure. Nothing is left debited when an error is returned in
    /// commit mode.
    #[instrument(
        skip(self, request),
        fields(
            invoice_id = %request.invoice_id,
            employee_id = %request.employee.employee_id,
            lines = request.lines.len(),
            mode = ?request.mode
        )
    )]
    pub async fn adjudicate(&self, request: AdjudicationRequest) -> Result<AdjudicationResult, AdjudicationError> {
        Self::validate(&request)?;

        let rules = self.load_rules(&request).await?;
        let item_ids: Vec<ItemId> = request.lines.iter().map(|l| l.item_id).collect();
        let interactions = self.catalog.interactions_among(&item_ids).await?;
        let alerts = InteractionScreener::screen(&item_ids, &interactions);
        for alert in alerts.iter().filter(|a| a.requires_review) {
            warn!(
                item_a = %alert.item_a,
                item_b = %alert.item_b,
                severity = alert.severity.as_str(),
                "interaction requires review"
            );
        }

        let window = PeriodType::covering_window(request.service_date);
        let prior = self
            .usage
            .usage_for(request.employee.employee_id, window, Some(request.invoice_id))
            .await?;
        let mut history = UsageHistory::new(prior);

        let insurance_id = request.employee.insurance_id;
        let mut ceiling = match request.mode {
            AdjudicationMode::Commit => {
                self.ledger
                    .credit_invoice(insurance_id, request.invoice_id, &request.actor, "invoice recalculation")
                    .await?;
                CeilingMode::Commit
            }
            AdjudicationMode::Preview => CeilingMode::Preview {
                remaining: self.ledger.balance(insurance_id).await?.remaining_amount,
            },
        };

        let mut items = Vec::with_capacity(request.lines.len());
        for (index, line) in request.lines.iter().enumerate() {
            let line_no = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let item_rules = rules
                .get(&line.item_id)
                .ok_or(AdjudicationError::ItemNotFound(line.item_id))?;
            let other_items: Vec<ItemId> = request
                .lines
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, l)| l.item_id)
                .collect();

            let priced = price_line(&LineInputs {
                line_no,
                line,
                item: &item_rules.item,
                prices: &item_rules.prices,
                conditions: &item_rules.conditions,
                groups: &item_rules.groups,
                discounts: &item_rules.discounts,
                employee: &request.employee,
                history: &history,
                other_items: &other_items,
                service_date: request.service_date,
                scale: self.settings.rounding_scale,
            });

            let outcome = match self.settle(&request, priced, &mut ceiling).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.release(&request).await;
                    return Err(error);
                }
            };

            history.push(outcome.usage_record(request.invoice_id, request.service_date, line.body_part_id));
            items.push(outcome);
        }

        let totals = InvoiceTotals::from_items(&items);
        info!(
            total = %totals.total_price,
            insurance = %totals.insurance_share,
            patient = %totals.patient_share,
            discount = %totals.discount_amount,
            deduction = %totals.deduction_amount,
            alerts = alerts.len(),
            "invoice adjudicated"
        );

        Ok(AdjudicationResult {
            invoice_id: request.invoice_id,
            mode: request.mode,
            items,
            totals,
            alerts,
            calculated_at: Utc::now(),
        })
    }

    fn validate(request: &AdjudicationRequest) -> Result<(), AdjudicationError> {
        if request.lines.is_empty() {
            return Err(AdjudicationError::validation("invoice has no lines"));
        }
        for (index, line) in request.lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(AdjudicationError::validation(format!(
                    "line {} has zero quantity",
                    index + 1
                )));
            }
            if line.unit_price.is_some_and(|p| p.is_negative()) {
                return Err(AdjudicationError::validation(format!(
                    "line {} has a negative unit price",
                    index + 1
                )));
            }
        }
        Ok(())
    }

    /// Loads every distinct item before anything is written
    async fn load_rules(&self, request: &AdjudicationRequest) -> Result<HashMap<ItemId, ItemRules>, AdjudicationError> {
        let mut rules = HashMap::new();
        for line in &request.lines {
            if rules.contains_key(&line.item_id) {
                continue;
            }
            let item = self.catalog.get_item(line.item_id).await.map_err(|e| {
                if e.is_not_found() {
                    AdjudicationError::ItemNotFound(line.item_id)
                } else {
                    AdjudicationError::Port(e)
                }
            })?;
            let classification = item.classification();
            let entry = ItemRules {
                prices: self.catalog.item_prices(item.id).await?,
                conditions: self.catalog.conditions_for(&classification).await?,
                groups: self.catalog.groups_for(&classification).await?,
                discounts: self.catalog.discounts_for(&request.employee, &classification).await?,
                item,
            };
            rules.insert(line.item_id, entry);
        }
        Ok(rules)
    }

    async fn settle(
        &self,
        request: &AdjudicationRequest,
        priced: PricedLine,
        ceiling: &mut CeilingMode,
    ) -> Result<ItemOutcome, AdjudicationError> {
        let requested = priced.insurance_requested;
        if !requested.is_positive() {
            return Ok(priced.settle(None));
        }

        let trace = match ceiling {
            CeilingMode::Commit => {
                let debit = self
                    .ledger
                    .debit(DebitRequest {
                        insurance_id: request.employee.insurance_id,
                        invoice_id: request.invoice_id,
                        line_no: priced.line_no,
                        amount: requested,
                        actor: request.actor.clone(),
                    })
                    .await?;
                CeilingTrace {
                    requested,
                    granted: debit.granted,
                    remaining_before: debit.remaining_before,
                    remaining_after: debit.remaining_after,
                    simulated: false,
                }
            }
            CeilingMode::Preview { remaining } => {
                let (granted, _) = grant(*remaining, requested);
                let trace = CeilingTrace {
                    requested,
                    granted,
                    remaining_before: *remaining,
                    remaining_after: *remaining - granted,
                    simulated: true,
                };
                *remaining = trace.remaining_after;
                trace
            }
        };

        Ok(priced.settle(Some(trace)))
    }

    /// Reverses partial debits after a failed commit run
    async fn release(&self, request: &AdjudicationRequest) {
        if request.mode != AdjudicationMode::Commit {
            return;
        }
        if let Err(error) = self
            .ledger
            .credit_invoice(
                request.employee.insurance_id,
                request.invoice_id,
                &request.actor,
                "adjudication aborted",
            )
            .await
        {
            warn!(invoice_id = %request.invoice_id, %error, "failed to release partial debits");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CategoryId, EffectivePeriod, EmployeeId, Lifecycle, Percentage};
    use domain_insurance::{Insurance, MockCeilingStore};
    use domain_pricing::{
        CatalogSnapshot, ItemKind, ItemSelector, MockPricingCatalog, RelationType,
    };
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    use crate::ports::mock::MockInvoiceStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(code: &str) -> Item {
        Item {
            id: ItemId::new(),
            code: code.to_string(),
            name: code.to_string(),
            kind: ItemKind::Service,
            category_id: CategoryId::new(),
            sub_category_id: None,
            group_id: None,
            is_covered: true,
            is_active: true,
        }
    }

    fn price(item: &Item, amount: rust_decimal::Decimal, insurer: rust_decimal::Decimal) -> ItemPrice {
        ItemPrice {
            id: core_kernel::ItemPriceId::new(),
            item_id: item.id,
            price: Money::new(amount),
            insurer_share: Percentage::new(insurer).unwrap(),
            patient_share: Percentage::new(dec!(100) - insurer).unwrap(),
            period: EffectivePeriod::starting(date(2024, 1, 1)),
            lifecycle: Lifecycle::Active,
        }
    }

    fn condition(item: &Item, coverage: rust_decimal::Decimal) -> ItemPriceCondition {
        ItemPriceCondition {
            id: core_kernel::ConditionId::new(),
            name: "standard".to_string(),
            scope: ItemSelector::Item(item.id),
            coverage: Percentage::new(coverage).unwrap(),
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
            period: EffectivePeriod::starting(date(2024, 1, 1)),
            lifecycle: Lifecycle::Active,
            filters: vec![],
            restrictions: vec![],
        }
    }

    fn employee(insurance: &Insurance) -> EmployeeContext {
        EmployeeContext {
            employee_id: insurance.employee_id,
            insurance_id: insurance.id,
            birth_date: Some(date(1985, 3, 1)),
            gender: None,
            relation: RelationType::Policyholder,
            province_code: None,
            location_code: None,
            employee_code: None,
            special_type: None,
            illness_codes: BTreeSet::new(),
            policy_start_date: date(2024, 1, 1),
        }
    }

    async fn setup(
        snapshot: CatalogSnapshot,
        ceiling: rust_decimal::Decimal,
    ) -> (InvoiceAdjudicator, MockCeilingStore, Insurance) {
        let insurance = Insurance::new(
            EmployeeId::new(),
            Money::new(ceiling),
            date(2024, 1, 1),
            date(2024, 12, 31),
        );
        let store = MockCeilingStore::with_policies(vec![insurance.clone()]).await;
        let adjudicator = InvoiceAdjudicator::new(
            Arc::new(MockPricingCatalog::new(snapshot)),
            Arc::new(MockInvoiceStore::new()),
            CeilingLedger::new(Arc::new(store.clone())),
            AdjudicationSettings::default(),
        );
        (adjudicator, store, insurance)
    }

    fn request(employee: EmployeeContext, lines: Vec<AdjudicationLine>, mode: AdjudicationMode) -> AdjudicationRequest {
        AdjudicationRequest {
            invoice_id: InvoiceId::new(),
            employee,
            service_date: date(2024, 6, 1),
            lines,
            mode,
            actor: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_condition_coverage_debits_ceiling() {
        let item = item("MRI");
        let snapshot = CatalogSnapshot::new()
            .with_price(price(&item, dec!(1000000), dec!(50)))
            .with_condition(condition(&item, dec!(80)))
            .with_item(item.clone());
        let (adjudicator, store, insurance) = setup(snapshot, dec!(10000000)).await;

        let result = adjudicator
            .adjudicate(request(employee(&insurance), vec![AdjudicationLine::new(item.id, 1)], AdjudicationMode::Commit))
            .await
            .unwrap();

        let line = &result.items[0];
        assert_eq!(line.insurance_share, Money::new(dec!(800000)));
        assert_eq!(line.patient_share, Money::new(dec!(200000)));
        assert!(line.is_balanced());
        assert_eq!(store.entries().await.len(), 1);
        let balance = adjudicator.ledger().balance(insurance.id).await.unwrap();
        assert_eq!(balance.remaining_amount, Money::new(dec!(9200000)));
    }

    #[tokio::test]
    async fn test_preview_never_writes() {
        let item = item("MRI");
        let snapshot = CatalogSnapshot::new()
            .with_price(price(&item, dec!(1000000), dec!(50)))
            .with_condition(condition(&item, dec!(80)))
            .with_item(item.clone());
        let (adjudicator, store, insurance) = setup(snapshot, dec!(500000)).await;

        let lines = vec![AdjudicationLine::new(item.id, 1), AdjudicationLine::new(item.id, 1)];
        let result = adjudicator
            .adjudicate(request(employee(&insurance), lines, AdjudicationMode::Preview))
            .await
            .unwrap();

        assert_eq!(result.items[0].insurance_share, Money::new(dec!(500000)));
        assert_eq!(result.items[1].insurance_share, Money::zero());
        assert!(result.items[1].pricing_details.ceiling.is_some_and(|c| c.simulated));
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_item_aborts_before_debit() {
        let item = item("MRI");
        let snapshot = CatalogSnapshot::new()
            .with_price(price(&item, dec!(1000), dec!(50)))
            .with_item(item.clone());
        let (adjudicator, store, insurance) = setup(snapshot, dec!(10000)).await;

        let missing = ItemId::new();
        let lines = vec![AdjudicationLine::new(item.id, 1), AdjudicationLine::new(missing, 1)];
        let err = adjudicator
            .adjudicate(request(employee(&insurance), lines, AdjudicationMode::Commit))
            .await
            .unwrap_err();

        assert!(matches!(err, AdjudicationError::ItemNotFound(id) if id == missing));
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_zero_quantity() {
        let (adjudicator, _, insurance) = setup(CatalogSnapshot::new(), dec!(1000)).await;
        let err = adjudicator
            .adjudicate(request(employee(&insurance), vec![AdjudicationLine::new(ItemId::new(), 0)], AdjudicationMode::Preview))
            .await
            .unwrap_err();
        assert!(matches!(err, AdjudicationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_policy_is_fatal() {
        let item = item("MRI");
        let snapshot = CatalogSnapshot::new().with_item(item.clone());
        let (adjudicator, _, insurance) = setup(snapshot, dec!(1000)).await;
        let mut employee = employee(&insurance);
        employee.insurance_id = core_kernel::InsuranceId::new();

        let err = adjudicator
            .adjudicate(request(employee, vec![AdjudicationLine::new(item.id, 1)], AdjudicationMode::Preview))
            .await
            .unwrap_err();
        assert!(matches!(err, AdjudicationError::InsuranceNotFound(_)));
    }

    #[tokio::test]
    async fn test_same_invoice_lines_count_toward_caps() {
        use domain_pricing::{ConditionRestriction, RestrictionKind};

        let item = item("PHYSIO");
        let mut capped = condition(&item, dec!(100));
        capped.restrictions.push(ConditionRestriction {
            id: core_kernel::RestrictionId::new(),
            kind: RestrictionKind::MaxCount { max_count: 1, period: PeriodType::Daily },
        });
        let snapshot = CatalogSnapshot::new()
            .with_price(price(&item, dec!(100), dec!(0)))
            .with_condition(capped)
            .with_item(item.clone());
        let (adjudicator, _, insurance) = setup(snapshot, dec!(10000)).await;

        let lines = vec![AdjudicationLine::new(item.id, 1), AdjudicationLine::new(item.id, 1)];
        let result = adjudicator
            .adjudicate(request(employee(&insurance), lines, AdjudicationMode::Preview))
            .await
            .unwrap();

        assert!(result.items[0].is_covered);
        assert_eq!(result.items[0].insurance_share, Money::new(dec!(100)));
        assert!(!result.items[1].is_covered);
        assert_eq!(result.items[1].deduction_amount, Money::new(dec!(100)));
        assert_eq!(result.totals.total_price, Money::new(dec!(200)));
    }
}
