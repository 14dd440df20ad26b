//! Invoice workflow over the adjudicator
//!
//! Rejected and cancelled invoices release every open ceiling debit they
//! hold. Approval keeps the debits.
//!
//! Every state change of an invoice runs under that invoice's lock. A
//! calculation that fails after touching the ledger releases the invoice's
//! debits and leaves it in draft, and submission checks that the debits
//! still held match the stored insurer share.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{EmployeeId, InsuranceId, InvoiceId, Money};
use domain_insurance::CeilingBalance;

use crate::adjudicator::{AdjudicationRequest, InvoiceAdjudicator};
use crate::error::AdjudicationError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::line::AdjudicationLine;
use crate::locks::InvoiceLocks;
use crate::outcome::{AdjudicationMode, AdjudicationResult};
use crate::ports::{EmployeePort, InvoicePort};

#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoicePort>,
    employees: Arc<dyn EmployeePort>,
    adjudicator: InvoiceAdjudicator,
    locks: InvoiceLocks,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoicePort>,
        employees: Arc<dyn EmployeePort>,
        adjudicator: InvoiceAdjudicator,
    ) -> Self {
        Self {
            invoices,
            employees,
            adjudicator,
            locks: InvoiceLocks::new(),
        }
    }

    pub fn adjudicator(&self) -> &InvoiceAdjudicator {
        &self.adjudicator
    }

    /// Creates and stores a draft invoice
    pub async fn create_draft(
        &self,
        employee_id: EmployeeId,
        service_date: NaiveDate,
        lines: Vec<AdjudicationLine>,
    ) -> Result<Invoice, AdjudicationError> {
        if lines.is_empty() {
            return Err(AdjudicationError::validation("invoice has no lines"));
        }
        let employee = self.employees.employee_context(employee_id).await?;
        let invoice = Invoice::draft(employee_id, employee.insurance_id, service_date, lines);
        self.invoices.save_invoice(&invoice).await?;
        info!(invoice_id = %invoice.id, %employee_id, "draft invoice created");
        Ok(invoice)
    }

    pub async fn get(&self, invoice_id: InvoiceId) -> Result<Invoice, AdjudicationError> {
        self.load(invoice_id).await
    }

    /// Prices lines without an invoice and without touching the ledger
    pub async fn preview(
        &self,
        employee_id: EmployeeId,
        service_date: NaiveDate,
        lines: Vec<AdjudicationLine>,
        actor: &str,
    ) -> Result<AdjudicationResult, AdjudicationError> {
        let employee = self.employees.employee_context(employee_id).await?;
        self.adjudicator
            .adjudicate(AdjudicationRequest {
                invoice_id: InvoiceId::new(),
                employee,
                service_date,
                lines,
                mode: AdjudicationMode::Preview,
                actor: actor.to_string(),
            })
            .await
    }

    /// Adjudicates a draft or calculated invoice and stores the outcome
    #[instrument(skip(self, actor))]
    pub async fn calculate(
        &self,
        invoice_id: InvoiceId,
        actor: &str,
    ) -> Result<(Invoice, AdjudicationResult), AdjudicationError> {
        let _guard = self.locks.acquire(invoice_id).await;
        let invoice = self.load(invoice_id).await?;
        if !invoice.is_editable() {
            return Err(AdjudicationError::InvalidStatusTransition {
                from: invoice.status.to_string(),
                to: InvoiceStatus::Calculated.to_string(),
            });
        }

        let employee = self.employees.employee_context(invoice.employee_id).await?;
        if employee.insurance_id != invoice.insurance_id {
            return Err(AdjudicationError::validation(format!(
                "invoice {} belongs to insurance {}, employee holds {}",
                invoice.id, invoice.insurance_id, employee.insurance_id
            )));
        }

        let adjudicated = self
            .adjudicator
            .adjudicate(AdjudicationRequest {
                invoice_id: invoice.id,
                employee,
                service_date: invoice.service_date,
                lines: invoice.requests(),
                mode: AdjudicationMode::Commit,
                actor: actor.to_string(),
            })
            .await;
        let result = match adjudicated {
            Ok(result) => result,
            Err(error) => {
                self.abandon(invoice, actor, "invoice calculation failed").await;
                return Err(error);
            }
        };

        let mut calculated = invoice.clone();
        if let Err(error) = calculated.apply_result(&result) {
            self.abandon(invoice, actor, "invoice calculation failed").await;
            return Err(error);
        }
        if let Err(error) = self.invoices.save_invoice(&calculated).await {
            self.abandon(invoice, actor, "invoice save failed").await;
            return Err(error.into());
        }
        Ok((calculated, result))
    }

    /// Submits a calculated invoice whose ceiling debits are intact
    pub async fn submit(&self, invoice_id: InvoiceId, actor: &str) -> Result<Invoice, AdjudicationError> {
        let _guard = self.locks.acquire(invoice_id).await;
        let mut invoice = self.load(invoice_id).await?;
        invoice.update_status(InvoiceStatus::Submitted)?;
        self.verify_debits(&invoice).await?;
        self.invoices.save_invoice(&invoice).await?;
        info!(%invoice_id, actor, "invoice submitted");
        Ok(invoice)
    }

    pub async fn approve(
        &self,
        invoice_id: InvoiceId,
        actor: &str,
        note: Option<String>,
    ) -> Result<Invoice, AdjudicationError> {
        let _guard = self.locks.acquire(invoice_id).await;
        let mut invoice = self.load(invoice_id).await?;
        invoice.decide(InvoiceStatus::Approved, actor, note)?;
        self.invoices.save_invoice(&invoice).await?;
        info!(%invoice_id, actor, "invoice approved");
        Ok(invoice)
    }

    /// Rejects a submitted invoice and credits its debits back
    pub async fn reject(
        &self,
        invoice_id: InvoiceId,
        actor: &str,
        note: Option<String>,
    ) -> Result<Invoice, AdjudicationError> {
        self.close(invoice_id, InvoiceStatus::Rejected, actor, note).await
    }

    /// Cancels a draft or calculated invoice and credits its debits back
    pub async fn cancel(
        &self,
        invoice_id: InvoiceId,
        actor: &str,
        note: Option<String>,
    ) -> Result<Invoice, AdjudicationError> {
        self.close(invoice_id, InvoiceStatus::Cancelled, actor, note).await
    }

    /// Read-only ceiling inquiry
    pub async fn ceiling(&self, insurance_id: InsuranceId) -> Result<CeilingBalance, AdjudicationError> {
        Ok(self.adjudicator.ledger().balance(insurance_id).await?)
    }

    async fn close(
        &self,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
        actor: &str,
        note: Option<String>,
    ) -> Result<Invoice, AdjudicationError> {
        let _guard = self.locks.acquire(invoice_id).await;
        let mut invoice = self.load(invoice_id).await?;
        let reason = note.clone().unwrap_or_else(|| format!("invoice {}", status));
        invoice.decide(status, actor, note)?;
        self.release(invoice.insurance_id, invoice.id, actor, &reason).await?;
        self.invoices.save_invoice(&invoice).await?;
        info!(%invoice_id, actor, status = status.as_str(), "invoice closed");
        Ok(invoice)
    }

    /// Releases the invoice's debits and stores it back as a draft
    async fn abandon(&self, mut invoice: Invoice, actor: &str, reason: &str) {
        if let Err(error) = self.release(invoice.insurance_id, invoice.id, actor, reason).await {
            warn!(invoice_id = %invoice.id, %error, "failed to release debits of abandoned calculation");
        }
        if invoice.reset_to_draft().is_err() {
            return;
        }
        match self.invoices.save_invoice(&invoice).await {
            Ok(()) => info!(invoice_id = %invoice.id, reason, "calculation abandoned, invoice back in draft"),
            Err(error) => warn!(invoice_id = %invoice.id, %error, "failed to store abandoned invoice as draft"),
        }
    }

    /// Open ceiling debits must equal the stored insurer share
    async fn verify_debits(&self, invoice: &Invoice) -> Result<(), AdjudicationError> {
        let expected = invoice.totals.map_or_else(Money::zero, |t| t.insurance_share);
        let held = self
            .adjudicator
            .ledger()
            .open_amount(invoice.insurance_id, invoice.id)
            .await?;
        if held != expected {
            warn!(invoice_id = %invoice.id, %expected, %held, "ceiling debits out of step with invoice");
            return Err(AdjudicationError::StaleCalculation {
                invoice_id: invoice.id,
                expected,
                held,
            });
        }
        Ok(())
    }

    async fn release(
        &self,
        insurance_id: InsuranceId,
        invoice_id: InvoiceId,
        actor: &str,
        reason: &str,
    ) -> Result<(), AdjudicationError> {
        self.adjudicator
            .ledger()
            .credit_invoice(insurance_id, invoice_id, actor, reason)
            .await?;
        Ok(())
    }

    async fn load(&self, invoice_id: InvoiceId) -> Result<Invoice, AdjudicationError> {
        self.invoices.get_invoice(invoice_id).await.map_err(|e| {
            if e.is_not_found() {
                AdjudicationError::InvoiceNotFound(invoice_id)
            } else {
                AdjudicationError::Port(e)
            }
        })
    }
}
