//! Ceiling ledger
//!
//! Every operation is an optimistic read-modify-write against one policy:
//! load the policy, compute the next state, and commit it conditional on
//! the version read. A stale version means another adjudication got there
//! first; the operation reloads and recomputes, up to `max_retries` times.
//! No lock spans more than one policy.
//!
//! Debits follow the partial coverage policy: the insurer is granted
//! `min(requested, remaining)` and the shortfall is reported back so the
//! caller can shift it to the patient. A debit never fails because the
//! ceiling is exhausted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{InsuranceId, InvoiceId, Money};

use crate::error::LedgerError;
use crate::history::{InsuranceHistory, LedgerEntry};
use crate::insurance::{CeilingBalance, Insurance};
use crate::ports::{CeilingChange, CeilingStore, CommitOutcome};

/// Default number of compare-and-swap retries
pub const DEFAULT_MAX_RETRIES: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitRequest {
    pub insurance_id: InsuranceId,
    pub invoice_id: InvoiceId,
    pub line_no: u32,
    pub amount: Money,
    pub actor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitOutcome {
    pub requested: Money,
    pub granted: Money,
    /// `requested - granted`, borne by the patient
    pub shortfall: Money,
    pub remaining_before: Money,
    pub remaining_after: Money,
}

impl DebitOutcome {
    pub fn is_partial(&self) -> bool {
        self.shortfall.is_positive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditOutcome {
    pub credited: Money,
    pub entries_reversed: usize,
    pub remaining_after: Money,
}

/// Splits a requested amount against a remaining ceiling
///
/// Used directly for preview adjudication, where nothing is written.
pub fn grant(remaining: Money, requested: Money) -> (Money, Money) {
    let granted = requested.min(remaining).floor_zero();
    (granted, requested - granted)
}

/// Atomic ceiling debits and credits over a [`CeilingStore`]
#[derive(Clone)]
pub struct CeilingLedger {
    store: Arc<dyn CeilingStore>,
    max_retries: u32,
}

impl CeilingLedger {
    pub fn new(store: Arc<dyn CeilingStore>) -> Self {
        Self {
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn CeilingStore> {
        &self.store
    }

    /// Current ceiling figures, read-only
    pub async fn balance(&self, insurance_id: InsuranceId) -> Result<CeilingBalance, LedgerError> {
        Ok(self.load(insurance_id).await?.balance())
    }

    /// Sum of the unreversed debits the invoice holds against the policy
    pub async fn open_amount(&self, insurance_id: InsuranceId, invoice_id: InvoiceId) -> Result<Money, LedgerError> {
        let open = self.store.open_entries(insurance_id, invoice_id).await?;
        Ok(open.iter().map(|e| e.amount).sum())
    }

    /// Debits up to `request.amount` from the remaining ceiling
    #[instrument(skip(self, request), fields(insurance_id = %request.insurance_id, invoice_id = %request.invoice_id, line_no = request.line_no))]
    pub async fn debit(&self, request: DebitRequest) -> Result<DebitOutcome, LedgerError> {
        if request.amount.is_negative() {
            return Err(LedgerError::NegativeAmount(request.amount));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let policy = self.load(request.insurance_id).await?;
            let (granted, shortfall) = grant(policy.remaining_amount, request.amount);
            let outcome = DebitOutcome {
                requested: request.amount,
                granted,
                shortfall,
                remaining_before: policy.remaining_amount,
                remaining_after: policy.remaining_amount - granted,
            };

            if shortfall.is_positive() {
                warn!(
                    requested = %request.amount,
                    remaining = %policy.remaining_amount,
                    "ceiling exhausted, shifting shortfall to patient"
                );
            }
            if granted.is_zero() {
                return Ok(outcome);
            }

            let next = policy.debited(granted)?;
            let change = CeilingChange {
                expected_version: policy.version,
                history: InsuranceHistory::pair(
                    policy.id,
                    (policy.used_amount, next.used_amount),
                    (policy.remaining_amount, next.remaining_amount),
                    &request.actor,
                    "invoice line ceiling debit",
                    Some(request.invoice_id),
                )
                .to_vec(),
                entries_added: vec![LedgerEntry::new(policy.id, request.invoice_id, request.line_no, granted)],
                entries_reversed: vec![],
                reversed_at: Utc::now(),
                next,
            };

            match self.store.commit(change).await? {
                CommitOutcome::Applied => {
                    info!(granted = %granted, remaining = %outcome.remaining_after, "ceiling debited");
                    return Ok(outcome);
                }
                CommitOutcome::VersionConflict => self.on_conflict(request.insurance_id, attempt).await?,
            }
        }
    }

    /// Reverses every open debit the invoice holds against the policy
    #[instrument(skip(self, actor, reason))]
    pub async fn credit_invoice(
        &self,
        insurance_id: InsuranceId,
        invoice_id: InvoiceId,
        actor: &str,
        reason: &str,
    ) -> Result<CreditOutcome, LedgerError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let policy = self.load(insurance_id).await?;
            let open = self.store.open_entries(insurance_id, invoice_id).await?;
            let credited: Money = open.iter().map(|e| e.amount).sum();

            if open.is_empty() {
                return Ok(CreditOutcome {
                    credited,
                    entries_reversed: 0,
                    remaining_after: policy.remaining_amount,
                });
            }

            let next = policy.credited(credited)?;
            let remaining_after = next.remaining_amount;
            let change = CeilingChange {
                expected_version: policy.version,
                history: InsuranceHistory::pair(
                    policy.id,
                    (policy.used_amount, next.used_amount),
                    (policy.remaining_amount, next.remaining_amount),
                    actor,
                    reason,
                    Some(invoice_id),
                )
                .to_vec(),
                entries_added: vec![],
                entries_reversed: open.iter().map(|e| e.id).collect(),
                reversed_at: Utc::now(),
                next,
            };

            match self.store.commit(change).await? {
                CommitOutcome::Applied => {
                    info!(credited = %credited, entries = open.len(), "invoice debits reversed");
                    return Ok(CreditOutcome {
                        credited,
                        entries_reversed: open.len(),
                        remaining_after,
                    });
                }
                CommitOutcome::VersionConflict => self.on_conflict(insurance_id, attempt).await?,
            }
        }
    }

    async fn load(&self, insurance_id: InsuranceId) -> Result<Insurance, LedgerError> {
        let policy = self.store.load(insurance_id).await.map_err(|e| {
            if e.is_not_found() {
                LedgerError::InsuranceNotFound(insurance_id)
            } else {
                LedgerError::Port(e)
            }
        })?;
        policy.verify()?;
        Ok(policy)
    }

    async fn on_conflict(&self, insurance_id: InsuranceId, attempt: u32) -> Result<(), LedgerError> {
        if attempt > self.max_retries {
            return Err(LedgerError::ConcurrentLedgerConflict {
                insurance_id,
                attempts: attempt,
            });
        }
        warn!(%insurance_id, attempt, "stale ceiling version, retrying");
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::MockCeilingStore;
    use chrono::NaiveDate;
    use core_kernel::EmployeeId;
    use rust_decimal_macros::dec;

    fn policy(ceiling: rust_decimal::Decimal) -> Insurance {
        Insurance::new(
            EmployeeId::new(),
            Money::new(ceiling),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    fn request(insurance_id: InsuranceId, invoice_id: InvoiceId, amount: rust_decimal::Decimal) -> DebitRequest {
        DebitRequest {
            insurance_id,
            invoice_id,
            line_no: 1,
            amount: Money::new(amount),
            actor: "tester".to_string(),
        }
    }

    #[test]
    fn test_grant_splits_at_remaining() {
        let (granted, shortfall) = grant(Money::new(dec!(500000)), Money::new(dec!(800000)));
        assert_eq!(granted, Money::new(dec!(500000)));
        assert_eq!(shortfall, Money::new(dec!(300000)));
    }

    #[tokio::test]
    async fn test_partial_debit_writes_history_pair() {
        let p = policy(dec!(500));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone()));

        let outcome = ledger.debit(request(p.id, InvoiceId::new(), dec!(800))).await.unwrap();
        assert_eq!(outcome.granted, Money::new(dec!(500)));
        assert_eq!(outcome.shortfall, Money::new(dec!(300)));
        assert!(outcome.is_partial());

        let history = store.history(p.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].actor, "tester");
        assert_eq!(ledger.balance(p.id).await.unwrap().remaining_amount, Money::zero());
    }

    #[tokio::test]
    async fn test_exhausted_ceiling_writes_nothing() {
        let p = policy(dec!(0));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone()));

        let outcome = ledger.debit(request(p.id, InvoiceId::new(), dec!(100))).await.unwrap();
        assert!(outcome.granted.is_zero());
        assert!(store.history(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_reverses_only_that_invoice() {
        let p = policy(dec!(1000));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone()));
        let first = InvoiceId::new();
        let second = InvoiceId::new();

        ledger.debit(request(p.id, first, dec!(300))).await.unwrap();
        ledger.debit(request(p.id, second, dec!(200))).await.unwrap();

        let credit = ledger.credit_invoice(p.id, first, "tester", "invoice cancelled").await.unwrap();
        assert_eq!(credit.credited, Money::new(dec!(300)));
        assert_eq!(credit.remaining_after, Money::new(dec!(800)));

        let again = ledger.credit_invoice(p.id, first, "tester", "invoice cancelled").await.unwrap();
        assert_eq!(again.entries_reversed, 0);

        assert_eq!(ledger.open_amount(p.id, first).await.unwrap(), Money::zero());
        assert_eq!(ledger.open_amount(p.id, second).await.unwrap(), Money::new(dec!(200)));
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let p = policy(dec!(1000));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        store.force_conflicts(3).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone())).with_max_retries(5);

        let outcome = ledger.debit(request(p.id, InvoiceId::new(), dec!(100))).await.unwrap();
        assert_eq!(outcome.granted, Money::new(dec!(100)));
    }

    #[tokio::test]
    async fn test_conflicts_surface_after_retries() {
        let p = policy(dec!(1000));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        store.force_conflicts(10).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone())).with_max_retries(2);

        let err = ledger.debit(request(p.id, InvoiceId::new(), dec!(100))).await.unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrentLedgerConflict { attempts: 3, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unknown_policy() {
        let ledger = CeilingLedger::new(Arc::new(MockCeilingStore::new()));
        let err = ledger.balance(InsuranceId::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsuranceNotFound(_)));
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;
    use crate::ports::mock::MockCeilingStore;
    use chrono::NaiveDate;
    use core_kernel::EmployeeId;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn policy(ceiling: Decimal) -> Insurance {
        Insurance::new(
            EmployeeId::new(),
            Money::new(ceiling),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let p = policy(Decimal::from(1_000));
        let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
        let ledger = CeilingLedger::new(Arc::new(store.clone())).with_max_retries(64);

        let mut handles = Vec::new();
        for line_no in 0..16u32 {
            let ledger = ledger.clone();
            let insurance_id = p.id;
            handles.push(tokio::spawn(async move {
                ledger
                    .debit(DebitRequest {
                        insurance_id,
                        invoice_id: InvoiceId::new(),
                        line_no,
                        amount: Money::new(Decimal::from(100)),
                        actor: "worker".to_string(),
                    })
                    .await
            }));
        }

        let mut granted = Money::zero();
        for handle in handles {
            granted += handle.await.unwrap().unwrap().granted;
        }

        let balance = ledger.balance(p.id).await.unwrap();
        assert_eq!(granted, Money::new(Decimal::from(1_000)));
        assert_eq!(balance.remaining_amount, Money::zero());
        assert_eq!(balance.used_amount + balance.remaining_amount, balance.annual_ceiling);

        let entries: Money = store.entries().await.iter().map(|e| e.amount).sum();
        assert_eq!(entries, balance.used_amount);
    }

    proptest! {
        #[test]
        fn used_plus_remaining_equals_ceiling_after_every_operation(
            ceiling in 0i64..1_000_000,
            ops in prop::collection::vec((any::<bool>(), 0i64..400_000), 1..20),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let p = policy(Decimal::from(ceiling));
                let store = MockCeilingStore::with_policies(vec![p.clone()]).await;
                let ledger = CeilingLedger::new(Arc::new(store));
                let mut invoices = Vec::new();

                for (is_debit, amount) in ops {
                    if is_debit || invoices.is_empty() {
                        let invoice_id = InvoiceId::new();
                        invoices.push(invoice_id);
                        ledger
                            .debit(DebitRequest {
                                insurance_id: p.id,
                                invoice_id,
                                line_no: 1,
                                amount: Money::new(Decimal::from(amount)),
                                actor: "prop".to_string(),
                            })
                            .await
                            .unwrap();
                    } else {
                        let invoice_id = invoices.remove(0);
                        ledger.credit_invoice(p.id, invoice_id, "prop", "reversal").await.unwrap();
                    }

                    let balance = ledger.balance(p.id).await.unwrap();
                    assert_eq!(balance.used_amount + balance.remaining_amount, balance.annual_ceiling);
                    assert!(!balance.remaining_amount.is_negative());
                }
            });
        }
    }
}
