//! Pre-built Test Fixtures
//!
//! Fixed dates and a fully wired in-memory engine. Every scenario prices on
//! [`Dates::service_date`] against a policy running through calendar 2024.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_kernel::{
    DomainPort, EmployeeId, HealthCheckResult, HealthCheckable, InsuranceId, InvoiceId, Money, PortError,
};
use domain_adjudication::{
    AdjudicationSettings, InvoiceAdjudicator, InvoiceService, MockEmployeeDirectory, MockInvoiceStore,
};
use domain_insurance::{
    CeilingBalance, CeilingChange, CeilingLedger, CeilingStore, CommitOutcome, Insurance, InsuranceHistory,
    LedgerEntry, MockCeilingStore,
};
use domain_pricing::{CatalogSnapshot, EmployeeContext, MockPricingCatalog};

use crate::builders::InsuranceBuilder;

static SERVICE_DATE: Lazy<NaiveDate> = Lazy::new(|| ymd(2024, 6, 15));

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Fixture for calendar dates
pub struct Dates;

impl Dates {
    /// Date every scenario prices on
    pub fn service_date() -> NaiveDate {
        *SERVICE_DATE
    }

    pub fn policy_start() -> NaiveDate {
        ymd(2024, 1, 1)
    }

    pub fn policy_end() -> NaiveDate {
        ymd(2024, 12, 31)
    }

    /// Reference data becomes effective before any policy starts
    pub fn reference_start() -> NaiveDate {
        ymd(2023, 1, 1)
    }

    /// A birth date giving exactly `age` completed years on the service date
    pub fn birth_date_for_age(age: u32) -> NaiveDate {
        let service = Self::service_date();
        let year = service.year() - age as i32;
        ymd(year, 1, 10)
    }
}

/// The in-memory engine: mock ports wired into a real [`InvoiceService`]
pub struct TestWorld {
    pub catalog: MockPricingCatalog,
    pub ceiling: MockCeilingStore,
    pub invoices: MockInvoiceStore,
    pub employees: MockEmployeeDirectory,
    pub service: InvoiceService,
}

impl TestWorld {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self::with_settings(snapshot, AdjudicationSettings::default())
    }

    pub fn with_settings(snapshot: CatalogSnapshot, settings: AdjudicationSettings) -> Self {
        let ceiling = MockCeilingStore::new();
        Self::assemble(snapshot, settings, ceiling.clone(), Arc::new(ceiling))
    }

    /// An engine whose ledger debits fail while the returned switch is on
    pub fn with_failing_ceiling(snapshot: CatalogSnapshot) -> (Self, FailingCeilingStore) {
        let ceiling = MockCeilingStore::new();
        let failing = FailingCeilingStore::new(ceiling.clone());
        let world = Self::assemble(
            snapshot,
            AdjudicationSettings::default(),
            ceiling,
            Arc::new(failing.clone()),
        );
        (world, failing)
    }

    fn assemble(
        snapshot: CatalogSnapshot,
        settings: AdjudicationSettings,
        ceiling: MockCeilingStore,
        ledger_store: Arc<dyn CeilingStore>,
    ) -> Self {
        let catalog = MockPricingCatalog::new(snapshot);
        let invoices = MockInvoiceStore::new();
        let employees = MockEmployeeDirectory::new();

        let adjudicator = InvoiceAdjudicator::new(
            Arc::new(catalog.clone()),
            Arc::new(invoices.clone()),
            CeilingLedger::new(ledger_store),
            settings,
        );
        let service = InvoiceService::new(
            Arc::new(invoices.clone()),
            Arc::new(employees.clone()),
            adjudicator,
        );

        Self { catalog, ceiling, invoices, employees, service }
    }

    /// Registers the employee with a fresh policy of the given annual ceiling
    pub async fn enroll(&self, employee: EmployeeContext, annual_ceiling: Decimal) -> (EmployeeId, Insurance) {
        let insurance = InsuranceBuilder::for_employee(employee.employee_id)
            .ceiling(annual_ceiling)
            .build();
        self.enroll_with(employee, insurance).await
    }

    /// Registers the employee with a prepared policy
    pub async fn enroll_with(&self, mut employee: EmployeeContext, insurance: Insurance) -> (EmployeeId, Insurance) {
        employee.insurance_id = insurance.id;
        let employee_id = employee.employee_id;
        self.ceiling.insert(insurance.clone()).await;
        self.employees.insert(employee).await;
        (employee_id, insurance)
    }

    pub async fn ceiling_balance(&self, insurance: &Insurance) -> CeilingBalance {
        self.service.ceiling(insurance.id).await.expect("ceiling lookup")
    }

    /// Current remaining ceiling
    pub async fn remaining(&self, insurance: &Insurance) -> Money {
        self.ceiling_balance(insurance).await.remaining_amount
    }
}

/// Ceiling store whose debit commits fail on demand
///
/// Credits always go through, so a failed run can still release what it
/// debited.
#[derive(Clone)]
pub struct FailingCeilingStore {
    inner: MockCeilingStore,
    fail_debits: Arc<AtomicBool>,
}

impl FailingCeilingStore {
    pub fn new(inner: MockCeilingStore) -> Self {
        Self {
            inner,
            fail_debits: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_debits(&self, fail: bool) {
        self.fail_debits.store(fail, Ordering::SeqCst);
    }
}

impl DomainPort for FailingCeilingStore {}

#[async_trait]
impl HealthCheckable for FailingCeilingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("failing-ceiling-store", 0)
    }
}

#[async_trait]
impl CeilingStore for FailingCeilingStore {
    async fn load(&self, insurance_id: InsuranceId) -> Result<Insurance, PortError> {
        self.inner.load(insurance_id).await
    }

    async fn open_entries(
        &self,
        insurance_id: InsuranceId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        self.inner.open_entries(insurance_id, invoice_id).await
    }

    async fn history(&self, insurance_id: InsuranceId) -> Result<Vec<InsuranceHistory>, PortError> {
        self.inner.history(insurance_id).await
    }

    async fn commit(&self, change: CeilingChange) -> Result<CommitOutcome, PortError> {
        if !change.entries_added.is_empty() && self.fail_debits.load(Ordering::SeqCst) {
            return Err(PortError::connection("ceiling store unavailable"));
        }
        self.inner.commit(change).await
    }
}
