//! PostgreSQL adapter for CeilingStore
//!
//! Versions are stored as `BIGINT`; the domain counts them as `u64`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, InsuranceHistoryId, InsuranceId, InvoiceId,
    LedgerEntryId, Money, PortError,
};
use domain_insurance::{CeilingChange, CeilingStore, CommitOutcome, Insurance, InsuranceHistory, LedgerEntry};

use super::convert;
use crate::error::DatabaseError;
use crate::repositories::insurance::{CeilingChangeRows, HistoryRow, InsuranceRepository, InsuranceRow, LedgerEntryRow};

#[derive(Debug, Clone)]
pub struct PostgresCeilingStore {
    pool: PgPool,
    repo: InsuranceRepository,
}

impl PostgresCeilingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: InsuranceRepository::new(pool.clone()),
            pool,
        }
    }

    /// Inserts a new policy
    pub async fn register(&self, insurance: &Insurance) -> Result<(), PortError> {
        self.repo.insert(&insurance_to_row(insurance)?).await?;
        Ok(())
    }
}

fn version_to_db(version: u64) -> Result<i64, PortError> {
    i64::try_from(version).map_err(|e| PortError::validation(format!("version out of range: {}", e)))
}

fn version_from_db(version: i64) -> Result<u64, PortError> {
    u64::try_from(version).map_err(|e| DatabaseError::decode("version", e).into())
}

fn line_no_to_db(line_no: u32) -> Result<i32, PortError> {
    i32::try_from(line_no).map_err(|e| PortError::validation(format!("line number out of range: {}", e)))
}

fn insurance_from_row(row: InsuranceRow) -> Result<Insurance, PortError> {
    Ok(Insurance {
        id: InsuranceId::from(row.id),
        employee_id: row.employee_id.into(),
        annual_ceiling: Money::new(row.annual_ceiling),
        used_amount: Money::new(row.used_amount),
        remaining_amount: Money::new(row.remaining_amount),
        start_date: row.start_date,
        end_date: row.end_date,
        version: version_from_db(row.version)?,
    })
}

fn insurance_to_row(insurance: &Insurance) -> Result<InsuranceRow, PortError> {
    Ok(InsuranceRow {
        id: insurance.id.into(),
        employee_id: insurance.employee_id.into(),
        annual_ceiling: insurance.annual_ceiling.amount(),
        used_amount: insurance.used_amount.amount(),
        remaining_amount: insurance.remaining_amount.amount(),
        start_date: insurance.start_date,
        end_date: insurance.end_date,
        version: version_to_db(insurance.version)?,
    })
}

fn entry_from_row(row: LedgerEntryRow) -> Result<LedgerEntry, PortError> {
    Ok(LedgerEntry {
        id: LedgerEntryId::from(row.id),
        insurance_id: InsuranceId::from(row.insurance_id),
        invoice_id: InvoiceId::from(row.invoice_id),
        line_no: convert::count("line_no", row.line_no)?,
        amount: Money::new(row.amount),
        recorded_at: row.recorded_at,
        reversed_at: row.reversed_at,
    })
}

fn entry_to_row(entry: &LedgerEntry) -> Result<LedgerEntryRow, PortError> {
    Ok(LedgerEntryRow {
        id: entry.id.into(),
        insurance_id: entry.insurance_id.into(),
        invoice_id: entry.invoice_id.into(),
        line_no: line_no_to_db(entry.line_no)?,
        amount: entry.amount.amount(),
        recorded_at: entry.recorded_at,
        reversed_at: entry.reversed_at,
    })
}

fn history_from_row(row: HistoryRow) -> Result<InsuranceHistory, PortError> {
    Ok(InsuranceHistory {
        id: InsuranceHistoryId::from(row.id),
        insurance_id: InsuranceId::from(row.insurance_id),
        field: convert::parse("field", &row.field)?,
        old_value: Money::new(row.old_value),
        new_value: Money::new(row.new_value),
        actor: row.actor,
        reason: row.reason,
        invoice_id: row.invoice_id.map(InvoiceId::from),
        recorded_at: row.recorded_at,
    })
}

fn history_to_row(history: &InsuranceHistory) -> HistoryRow {
    HistoryRow {
        id: history.id.into(),
        insurance_id: history.insurance_id.into(),
        field: history.field.as_str().to_string(),
        old_value: history.old_value.amount(),
        new_value: history.new_value.amount(),
        actor: history.actor.clone(),
        reason: history.reason.clone(),
        invoice_id: history.invoice_id.map(Into::into),
        recorded_at: history.recorded_at,
    }
}

fn change_to_rows(change: &CeilingChange) -> Result<CeilingChangeRows, PortError> {
    Ok(CeilingChangeRows {
        insurance_id: change.next.id.into(),
        expected_version: version_to_db(change.expected_version)?,
        next_version: version_to_db(change.next.version)?,
        used_amount: change.next.used_amount.amount(),
        remaining_amount: change.next.remaining_amount.amount(),
        history: change.history.iter().map(history_to_row).collect(),
        entries_added: change.entries_added.iter().map(entry_to_row).collect::<Result<_, _>>()?,
        entries_reversed: change.entries_reversed.iter().map(|id| Uuid::from(*id)).collect(),
        reversed_at: change.reversed_at,
    })
}

impl DomainPort for PostgresCeilingStore {}

#[async_trait]
impl HealthCheckable for PostgresCeilingStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-ceiling-store").await
    }
}

#[async_trait]
impl CeilingStore for PostgresCeilingStore {
    async fn load(&self, insurance_id: InsuranceId) -> Result<Insurance, PortError> {
        insurance_from_row(self.repo.get(insurance_id.into()).await?)
    }

    async fn open_entries(
        &self,
        insurance_id: InsuranceId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        self.repo
            .open_entries(insurance_id.into(), invoice_id.into())
            .await?
            .into_iter()
            .map(entry_from_row)
            .collect()
    }

    async fn history(&self, insurance_id: InsuranceId) -> Result<Vec<InsuranceHistory>, PortError> {
        self.repo
            .history(insurance_id.into())
            .await?
            .into_iter()
            .map(history_from_row)
            .collect()
    }

    async fn commit(&self, change: CeilingChange) -> Result<CommitOutcome, PortError> {
        let rows = change_to_rows(&change)?;
        let applied = match self.repo.commit_change(rows).await {
            Ok(applied) => applied,
            // A serialization failure is another writer winning the race
            Err(DatabaseError::SerializationFailure(_)) => false,
            Err(e) => return Err(e.into()),
        };

        if applied {
            Ok(CommitOutcome::Applied)
        } else {
            tracing::debug!(
                insurance_id = %change.next.id,
                expected_version = change.expected_version,
                "Ceiling commit lost version race"
            );
            Ok(CommitOutcome::VersionConflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::EmployeeId;
    use rust_decimal_macros::dec;

    fn policy() -> Insurance {
        Insurance {
            id: InsuranceId::new(),
            employee_id: EmployeeId::new(),
            annual_ceiling: Money::new(dec!(10000000)),
            used_amount: Money::new(dec!(800000)),
            remaining_amount: Money::new(dec!(9200000)),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            version: 4,
        }
    }

    #[test]
    fn test_insurance_row_round_trip_keeps_version() {
        let insurance = policy();
        let row = insurance_to_row(&insurance).unwrap();
        assert_eq!(row.version, 4);
        assert_eq!(insurance_from_row(row).unwrap(), insurance);
    }

    #[test]
    fn test_negative_version_is_a_decode_error() {
        let mut row = insurance_to_row(&policy()).unwrap();
        row.version = -1;
        assert!(matches!(insurance_from_row(row), Err(PortError::Transformation { .. })));
    }

    #[test]
    fn test_change_rows_carry_next_state() {
        let current = policy();
        let next = Insurance {
            used_amount: Money::new(dec!(1000000)),
            remaining_amount: Money::new(dec!(9000000)),
            version: 5,
            ..current.clone()
        };
        let invoice_id = InvoiceId::new();
        let entry = LedgerEntry::new(current.id, invoice_id, 1, Money::new(dec!(200000)));
        let change = CeilingChange {
            expected_version: current.version,
            next,
            history: Vec::new(),
            entries_added: vec![entry],
            entries_reversed: Vec::new(),
            reversed_at: Utc::now(),
        };

        let rows = change_to_rows(&change).unwrap();
        assert_eq!(rows.expected_version, 4);
        assert_eq!(rows.next_version, 5);
        assert_eq!(rows.remaining_amount, dec!(9000000));
        assert_eq!(rows.entries_added[0].line_no, 1);
    }
}
