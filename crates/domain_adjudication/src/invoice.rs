//! Invoice aggregate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{EmployeeId, InsuranceId, InvoiceId, InvoiceItemId};

use crate::error::AdjudicationError;
use crate::line::AdjudicationLine;
use crate::outcome::{AdjudicationResult, InvoiceTotals, ItemOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    /// Priced and debited against the ceiling
    Calculated,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Calculated => "calculated",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses whose ledger debits are final or released
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Approved | InvoiceStatus::Rejected | InvoiceStatus::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = AdjudicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "calculated" => Ok(InvoiceStatus::Calculated),
            "submitted" => Ok(InvoiceStatus::Submitted),
            "approved" => Ok(InvoiceStatus::Approved),
            "rejected" => Ok(InvoiceStatus::Rejected),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(AdjudicationError::validation(format!("unknown invoice status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: InvoiceItemId,
    pub line_no: u32,
    pub request: AdjudicationLine,
    /// Set once the invoice is calculated
    pub outcome: Option<ItemOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub employee_id: EmployeeId,
    pub insurance_id: InsuranceId,
    pub service_date: NaiveDate,
    pub status: InvoiceStatus,
    pub lines: Vec<InvoiceLine>,
    pub totals: Option<InvoiceTotals>,
    pub calculated_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a draft with lines numbered from 1
    pub fn draft(
        employee_id: EmployeeId,
        insurance_id: InsuranceId,
        service_date: NaiveDate,
        lines: Vec<AdjudicationLine>,
    ) -> Self {
        let now = Utc::now();
        let lines = lines
            .into_iter()
            .zip(1u32..)
            .map(|(request, line_no)| InvoiceLine {
                id: InvoiceItemId::new(),
                line_no,
                request,
                outcome: None,
            })
            .collect();

        Self {
            id: InvoiceId::new(),
            employee_id,
            insurance_id,
            service_date,
            status: InvoiceStatus::Draft,
            lines,
            totals: None,
            calculated_at: None,
            decided_by: None,
            decision_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn requests(&self) -> Vec<AdjudicationLine> {
        self.lines.iter().map(|l| l.request.clone()).collect()
    }

    /// Whether the invoice may be (re)calculated
    pub fn is_editable(&self) -> bool {
        matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Calculated)
    }

    /// Records a committed adjudication on the lines
    pub fn apply_result(&mut self, result: &AdjudicationResult) -> Result<(), AdjudicationError> {
        self.update_status(InvoiceStatus::Calculated)?;
        for line in self.lines.iter_mut() {
            line.outcome = result.items.iter().find(|o| o.line_no == line.line_no).cloned();
        }
        self.totals = Some(result.totals);
        self.calculated_at = Some(result.calculated_at);
        Ok(())
    }

    /// Drops a calculation whose ceiling debits were not kept
    ///
    /// The invoice must be calculated again before it can be submitted.
    pub fn reset_to_draft(&mut self) -> Result<(), AdjudicationError> {
        if !self.is_editable() {
            return Err(AdjudicationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: InvoiceStatus::Draft.to_string(),
            });
        }
        self.status = InvoiceStatus::Draft;
        for line in self.lines.iter_mut() {
            line.outcome = None;
        }
        self.totals = None;
        self.calculated_at = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records an approval, rejection or cancellation
    pub fn decide(
        &mut self,
        status: InvoiceStatus,
        actor: &str,
        note: Option<String>,
    ) -> Result<(), AdjudicationError> {
        self.update_status(status)?;
        self.decided_by = Some(actor.to_string());
        self.decision_note = note;
        Ok(())
    }

    /// Updates the status
    pub fn update_status(&mut self, status: InvoiceStatus) -> Result<(), AdjudicationError> {
        if !self.can_transition_to(status) {
            return Err(AdjudicationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn can_transition_to(&self, target: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self.status, target),
            (Draft, Calculated) |
            (Calculated, Calculated) |
            (Calculated, Submitted) |
            (Submitted, Approved) |
            (Submitted, Rejected) |
            (Draft, Cancelled) |
            (Calculated, Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::ItemId;

    fn invoice() -> Invoice {
        Invoice::draft(
            EmployeeId::new(),
            InsuranceId::new(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            vec![AdjudicationLine::new(ItemId::new(), 1), AdjudicationLine::new(ItemId::new(), 2)],
        )
    }

    #[test]
    fn test_draft_numbers_lines_from_one() {
        let invoice = invoice();
        let numbers: Vec<u32> = invoice.lines.iter().map(|l| l.line_no).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert!(invoice.is_editable());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut invoice = invoice();
        invoice.update_status(InvoiceStatus::Calculated).unwrap();
        invoice.update_status(InvoiceStatus::Calculated).unwrap();
        invoice.update_status(InvoiceStatus::Submitted).unwrap();
        assert!(!invoice.is_editable());
        invoice.decide(InvoiceStatus::Approved, "reviewer", None).unwrap();
        assert!(invoice.status.is_terminal());
        assert_eq!(invoice.decided_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn test_rejects_skipping_calculation() {
        let mut invoice = invoice();
        let err = invoice.update_status(InvoiceStatus::Submitted).unwrap_err();
        assert!(matches!(err, AdjudicationError::InvalidStatusTransition { .. }));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut invoice = invoice();
        invoice.update_status(InvoiceStatus::Cancelled).unwrap();
        assert!(invoice.update_status(InvoiceStatus::Calculated).is_err());
        assert!(invoice.update_status(InvoiceStatus::Draft).is_err());
    }

    #[test]
    fn test_reset_to_draft_clears_calculation() {
        let mut invoice = invoice();
        invoice.update_status(InvoiceStatus::Calculated).unwrap();
        invoice.totals = Some(InvoiceTotals::default());
        invoice.calculated_at = Some(Utc::now());

        invoice.reset_to_draft().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert!(invoice.totals.is_none());
        assert!(invoice.calculated_at.is_none());
        assert!(invoice.lines.iter().all(|l| l.outcome.is_none()));
        assert!(invoice.update_status(InvoiceStatus::Submitted).is_err());

        invoice.update_status(InvoiceStatus::Calculated).unwrap();
        invoice.update_status(InvoiceStatus::Submitted).unwrap();
        assert!(invoice.reset_to_draft().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Calculated,
            InvoiceStatus::Submitted,
            InvoiceStatus::Approved,
            InvoiceStatus::Rejected,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        assert!("paid".parse::<InvoiceStatus>().is_err());
    }
}
