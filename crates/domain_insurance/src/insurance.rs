//! Insurance policy and its ceiling fields
//!
//! `annual_ceiling`, `used_amount` and `remaining_amount` are linked:
//! `used_amount + remaining_amount == annual_ceiling` after every change.
//! Changes go through [`Insurance::debited`] / [`Insurance::credited`],
//! which return the next state with a bumped version for the
//! compare-and-swap write.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{EmployeeId, InsuranceId, Money};

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insurance {
    pub id: InsuranceId,
    pub employee_id: EmployeeId,
    pub annual_ceiling: Money,
    pub used_amount: Money,
    pub remaining_amount: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Incremented on every ceiling write
    pub version: u64,
}

impl Insurance {
    /// A fresh policy with the full ceiling available
    pub fn new(
        employee_id: EmployeeId,
        annual_ceiling: Money,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: InsuranceId::new(),
            employee_id,
            annual_ceiling,
            used_amount: Money::zero(),
            remaining_amount: annual_ceiling,
            start_date,
            end_date,
            version: 0,
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Checks the stored ceiling fields agree with each other
    pub fn verify(&self) -> Result<(), LedgerError> {
        if self.used_amount + self.remaining_amount != self.annual_ceiling {
            return Err(LedgerError::InvariantViolated {
                insurance_id: self.id,
                message: format!(
                    "used {} + remaining {} != ceiling {}",
                    self.used_amount, self.remaining_amount, self.annual_ceiling
                ),
            });
        }
        if self.remaining_amount.is_negative() || self.used_amount.is_negative() {
            return Err(LedgerError::InvariantViolated {
                insurance_id: self.id,
                message: "ceiling fields must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Portion of `requested` the remaining ceiling can cover
    pub fn grantable(&self, requested: Money) -> Money {
        requested.min(self.remaining_amount).floor_zero()
    }

    /// State after debiting `amount`, which must not exceed the remaining ceiling
    pub fn debited(&self, amount: Money) -> Result<Insurance, LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::NegativeAmount(amount));
        }
        if amount > self.remaining_amount {
            return Err(LedgerError::InvariantViolated {
                insurance_id: self.id,
                message: format!("debit {} exceeds remaining {}", amount, self.remaining_amount),
            });
        }
        Ok(Insurance {
            used_amount: self.used_amount + amount,
            remaining_amount: self.remaining_amount - amount,
            version: self.version + 1,
            ..self.clone()
        })
    }

    /// State after crediting `amount` back, which must not exceed the used amount
    pub fn credited(&self, amount: Money) -> Result<Insurance, LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::NegativeAmount(amount));
        }
        if amount > self.used_amount {
            return Err(LedgerError::InvariantViolated {
                insurance_id: self.id,
                message: format!("credit {} exceeds used {}", amount, self.used_amount),
            });
        }
        Ok(Insurance {
            used_amount: self.used_amount - amount,
            remaining_amount: self.remaining_amount + amount,
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub fn balance(&self) -> CeilingBalance {
        CeilingBalance {
            insurance_id: self.id,
            annual_ceiling: self.annual_ceiling,
            used_amount: self.used_amount,
            remaining_amount: self.remaining_amount,
        }
    }
}

/// Read-only view of a policy's ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeilingBalance {
    pub insurance_id: InsuranceId,
    pub annual_ceiling: Money,
    pub used_amount: Money,
    pub remaining_amount: Money,
}
