//! Insurance DTOs

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use domain_insurance::CeilingBalance;

#[derive(Debug, Serialize)]
pub struct CeilingResponse {
    pub insurance_id: Uuid,
    pub annual_ceiling: Decimal,
    pub used_amount: Decimal,
    pub remaining_amount: Decimal,
}

impl From<CeilingBalance> for CeilingResponse {
    fn from(balance: CeilingBalance) -> Self {
        Self {
            insurance_id: balance.insurance_id.into(),
            annual_ceiling: balance.annual_ceiling.amount(),
            used_amount: balance.used_amount.amount(),
            remaining_amount: balance.remaining_amount.amount(),
        }
    }
}
