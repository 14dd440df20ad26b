//! Per-invoice mutual exclusion
//!
//! Calculation credits an invoice's open debits, re-debits every line and
//! then stores the outcome. Two such runs on one invoice must not
//! interleave, or both runs' debits survive.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::InvoiceId;

/// Keyed async locks, one per invoice with a pending operation
#[derive(Debug, Default, Clone)]
pub struct InvoiceLocks {
    locks: Arc<Mutex<HashMap<InvoiceId, Arc<Mutex<()>>>>>,
}

impl InvoiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has the invoice
    pub async fn acquire(&self, invoice_id: InvoiceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map references an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(invoice_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Invoices currently held or awaited
    pub async fn pending(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_invoice_waits_for_holder() {
        let locks = InvoiceLocks::new();
        let id = InvoiceId::new();

        let guard = locks.acquire(id).await;
        assert!(timeout(Duration::from_millis(20), locks.acquire(id)).await.is_err());

        drop(guard);
        assert!(timeout(Duration::from_millis(200), locks.acquire(id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_invoices_are_independent() {
        let locks = InvoiceLocks::new();
        let _held = locks.acquire(InvoiceId::new()).await;

        assert!(timeout(Duration::from_millis(200), locks.acquire(InvoiceId::new())).await.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = InvoiceLocks::new();
        for _ in 0..5 {
            let _guard = locks.acquire(InvoiceId::new()).await;
        }
        let _held = locks.acquire(InvoiceId::new()).await;

        assert_eq!(locks.pending().await, 1);
    }
}
