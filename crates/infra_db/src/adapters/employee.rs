//! PostgreSQL adapter for EmployeePort

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeSet;

use core_kernel::{DomainPort, EmployeeId, HealthCheckResult, HealthCheckable, InsuranceId, PortError};
use domain_adjudication::EmployeePort;
use domain_pricing::EmployeeContext;

use super::convert;
use crate::repositories::employee::{EmployeeRepository, EmployeeRow};

#[derive(Debug, Clone)]
pub struct PostgresEmployeeAdapter {
    pool: PgPool,
    repo: EmployeeRepository,
}

impl PostgresEmployeeAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: EmployeeRepository::new(pool.clone()),
            pool,
        }
    }
}

fn context_from_row(row: EmployeeRow, illnesses: Vec<String>) -> Result<EmployeeContext, PortError> {
    Ok(EmployeeContext {
        employee_id: EmployeeId::from(row.id),
        insurance_id: InsuranceId::from(row.insurance_id),
        birth_date: row.birth_date,
        gender: convert::parse_opt("gender", row.gender.as_deref())?,
        relation: convert::parse("relation", &row.relation)?,
        province_code: row.province_code,
        location_code: row.location_code,
        employee_code: row.employee_code,
        special_type: row.special_type,
        illness_codes: illnesses.into_iter().collect::<BTreeSet<_>>(),
        policy_start_date: row.policy_start_date,
    })
}

impl DomainPort for PostgresEmployeeAdapter {}

#[async_trait]
impl HealthCheckable for PostgresEmployeeAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-employees").await
    }
}

#[async_trait]
impl EmployeePort for PostgresEmployeeAdapter {
    async fn employee_context(&self, employee_id: EmployeeId) -> Result<EmployeeContext, PortError> {
        let row = self.repo.get_with_policy(employee_id.into()).await?;
        let illnesses = self.repo.illnesses(employee_id.into()).await?;
        context_from_row(row, illnesses)
    }
}
