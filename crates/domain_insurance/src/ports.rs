//! Ceiling Store Port
//!
//! Persistence for policies, ledger entries and audit rows. The only write
//! is [`CeilingStore::commit`], which must apply a whole [`CeilingChange`]
//! atomically and only if the stored version still equals
//! `expected_version`. The PostgreSQL adapter does this with a conditional
//! `UPDATE ... WHERE version = $n` inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, HealthCheckable, InsuranceId, InvoiceId, LedgerEntryId, PortError};

use crate::history::{InsuranceHistory, LedgerEntry};
use crate::insurance::Insurance;

/// Everything one ledger operation writes
#[derive(Debug, Clone)]
pub struct CeilingChange {
    pub expected_version: u64,
    /// Policy state after the change, `version == expected_version + 1`
    pub next: Insurance,
    pub history: Vec<InsuranceHistory>,
    pub entries_added: Vec<LedgerEntry>,
    pub entries_reversed: Vec<LedgerEntryId>,
    pub reversed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The stored version moved since it was read; nothing was written
    VersionConflict,
}

#[async_trait]
pub trait CeilingStore: DomainPort + HealthCheckable {
    /// Retrieves a policy, or `PortError::NotFound`
    async fn load(&self, insurance_id: InsuranceId) -> Result<Insurance, PortError>;

    /// Unreversed debits the invoice holds against the policy
    async fn open_entries(
        &self,
        insurance_id: InsuranceId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LedgerEntry>, PortError>;

    /// Audit rows for the policy, oldest first
    async fn history(&self, insurance_id: InsuranceId) -> Result<Vec<InsuranceHistory>, PortError>;

    /// Applies the change if the stored version equals `expected_version`
    async fn commit(&self, change: CeilingChange) -> Result<CommitOutcome, PortError>;
}

/// Mock implementation of CeilingStore for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct State {
        policies: HashMap<InsuranceId, Insurance>,
        entries: Vec<LedgerEntry>,
        history: Vec<InsuranceHistory>,
        forced_conflicts: u32,
    }

    /// In-memory store with version-checked commits
    #[derive(Debug, Default, Clone)]
    pub struct MockCeilingStore {
        state: Arc<RwLock<State>>,
    }

    impl MockCeilingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_policies(policies: Vec<Insurance>) -> Self {
            let store = Self::new();
            for policy in policies {
                store.insert(policy).await;
            }
            store
        }

        /// Adds or replaces a policy
        pub async fn insert(&self, policy: Insurance) {
            self.state.write().await.policies.insert(policy.id, policy);
        }

        /// Makes the next `n` commits report a version conflict
        pub async fn force_conflicts(&self, n: u32) {
            self.state.write().await.forced_conflicts = n;
        }

        /// Every ledger entry, open or reversed
        pub async fn entries(&self) -> Vec<LedgerEntry> {
            self.state.read().await.entries.clone()
        }
    }

    impl DomainPort for MockCeilingStore {}

    #[async_trait]
    impl HealthCheckable for MockCeilingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-ceiling-store", 0)
        }
    }

    #[async_trait]
    impl CeilingStore for MockCeilingStore {
        async fn load(&self, insurance_id: InsuranceId) -> Result<Insurance, PortError> {
            self.state
                .read()
                .await
                .policies
                .get(&insurance_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Insurance", insurance_id))
        }

        async fn open_entries(
            &self,
            insurance_id: InsuranceId,
            invoice_id: InvoiceId,
        ) -> Result<Vec<LedgerEntry>, PortError> {
            let state = self.state.read().await;
            Ok(state
                .entries
                .iter()
                .filter(|e| e.insurance_id == insurance_id && e.invoice_id == invoice_id && e.is_open())
                .cloned()
                .collect())
        }

        async fn history(&self, insurance_id: InsuranceId) -> Result<Vec<InsuranceHistory>, PortError> {
            let state = self.state.read().await;
            Ok(state.history.iter().filter(|h| h.insurance_id == insurance_id).cloned().collect())
        }

        async fn commit(&self, change: CeilingChange) -> Result<CommitOutcome, PortError> {
            let mut state = self.state.write().await;

            if state.forced_conflicts > 0 {
                state.forced_conflicts -= 1;
                return Ok(CommitOutcome::VersionConflict);
            }

            let current = state
                .policies
                .get(&change.next.id)
                .ok_or_else(|| PortError::not_found("Insurance", change.next.id))?;
            if current.version != change.expected_version {
                return Ok(CommitOutcome::VersionConflict);
            }

            state.policies.insert(change.next.id, change.next);
            for entry in state.entries.iter_mut() {
                if change.entries_reversed.contains(&entry.id) {
                    entry.reversed_at = Some(change.reversed_at);
                }
            }
            state.entries.extend(change.entries_added);
            state.history.extend(change.history);
            Ok(CommitOutcome::Applied)
        }
    }
}
