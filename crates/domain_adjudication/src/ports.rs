//! Adjudication Ports
//!
//! Usage history, invoice persistence and employee lookup. Pricing reference
//! data comes through [`domain_pricing::PricingCatalogPort`] and the ceiling
//! through [`domain_insurance::CeilingStore`].

use async_trait::async_trait;

use core_kernel::{DateWindow, DomainPort, EmployeeId, HealthCheckable, InvoiceId, PortError};
use domain_pricing::{EmployeeContext, UsageRecord};

use crate::invoice::Invoice;

/// Prior usage consulted by restrictions and group caps
#[async_trait]
pub trait UsageHistoryPort: DomainPort + HealthCheckable {
    /// Lines adjudicated for the employee with a service date in `window`
    ///
    /// Lines of `exclude` are left out so a recalculation does not count the
    /// invoice against itself. Cancelled and rejected invoices are ignored.
    async fn usage_for(
        &self,
        employee_id: EmployeeId,
        window: DateWindow,
        exclude: Option<InvoiceId>,
    ) -> Result<Vec<UsageRecord>, PortError>;
}

#[async_trait]
pub trait InvoicePort: DomainPort + HealthCheckable {
    /// Retrieves an invoice with its lines, or `PortError::NotFound`
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Inserts or replaces an invoice and its lines
    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;
}

#[async_trait]
pub trait EmployeePort: DomainPort + HealthCheckable {
    /// Builds the attributes conditions are evaluated against
    async fn employee_context(&self, employee_id: EmployeeId) -> Result<EmployeeContext, PortError>;
}

/// Mock implementations for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::invoice::InvoiceStatus;

    #[derive(Debug, Default)]
    struct State {
        invoices: HashMap<InvoiceId, Invoice>,
        /// Usage seeded directly, keyed by employee
        seeded: Vec<(EmployeeId, UsageRecord)>,
    }

    /// In-memory invoices that also serve usage history
    ///
    /// Usage is derived from the outcomes of saved invoices, the same way the
    /// PostgreSQL adapter reads it from invoice lines.
    #[derive(Debug, Default, Clone)]
    pub struct MockInvoiceStore {
        state: Arc<RwLock<State>>,
    }

    impl MockInvoiceStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds usage that has no invoice in the store
        pub async fn seed_usage(&self, employee_id: EmployeeId, records: Vec<UsageRecord>) {
            let mut state = self.state.write().await;
            state.seeded.extend(records.into_iter().map(|r| (employee_id, r)));
        }

        pub async fn invoice_count(&self) -> usize {
            self.state.read().await.invoices.len()
        }
    }

    impl DomainPort for MockInvoiceStore {}

    #[async_trait]
    impl HealthCheckable for MockInvoiceStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-invoice-store", 0)
        }
    }

    #[async_trait]
    impl InvoicePort for MockInvoiceStore {
        async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.state
                .read()
                .await
                .invoices
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn save_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
            self.state.write().await.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl UsageHistoryPort for MockInvoiceStore {
        async fn usage_for(
            &self,
            employee_id: EmployeeId,
            window: DateWindow,
            exclude: Option<InvoiceId>,
        ) -> Result<Vec<UsageRecord>, PortError> {
            let state = self.state.read().await;

            let mut records: Vec<UsageRecord> = state
                .seeded
                .iter()
                .filter(|(employee, r)| *employee == employee_id && window.contains(r.service_date))
                .map(|(_, r)| r.clone())
                .collect();

            let counted = state.invoices.values().filter(|i| {
                i.employee_id == employee_id
                    && Some(i.id) != exclude
                    && window.contains(i.service_date)
                    && !matches!(i.status, InvoiceStatus::Cancelled | InvoiceStatus::Rejected)
            });
            for invoice in counted {
                for line in &invoice.lines {
                    if let Some(outcome) = &line.outcome {
                        records.push(outcome.usage_record(invoice.id, invoice.service_date, line.request.body_part_id));
                    }
                }
            }

            records.sort_by_key(|r| r.service_date);
            Ok(records)
        }
    }

    /// In-memory employee directory
    #[derive(Debug, Default, Clone)]
    pub struct MockEmployeeDirectory {
        employees: Arc<RwLock<HashMap<EmployeeId, EmployeeContext>>>,
    }

    impl MockEmployeeDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, employee: EmployeeContext) {
            self.employees.write().await.insert(employee.employee_id, employee);
        }
    }

    impl DomainPort for MockEmployeeDirectory {}

    #[async_trait]
    impl HealthCheckable for MockEmployeeDirectory {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-employee-directory", 0)
        }
    }

    #[async_trait]
    impl EmployeePort for MockEmployeeDirectory {
        async fn employee_context(&self, employee_id: EmployeeId) -> Result<EmployeeContext, PortError> {
            self.employees
                .read()
                .await
                .get(&employee_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Employee", employee_id))
        }
    }
}
