//! Employee repository

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: PgPool,
}

impl EmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The employee joined with their most recent policy
    pub async fn get_with_policy(&self, id: Uuid) -> Result<EmployeeRow, DatabaseError> {
        sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT e.id, e.birth_date, e.gender, e.relation, e.province_code, e.location_code,
                   e.employee_code, e.special_type,
                   ins.id AS insurance_id, ins.start_date AS policy_start_date
            FROM employees e
            JOIN LATERAL (
                SELECT id, start_date
                FROM insurances
                WHERE employee_id = e.id
                ORDER BY start_date DESC
                LIMIT 1
            ) ins ON TRUE
            WHERE e.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Employee", id))
    }

    pub async fn illnesses(&self, id: Uuid) -> Result<Vec<String>, DatabaseError> {
        let codes = sqlx::query_scalar::<_, String>(
            "SELECT illness_code FROM employee_illnesses WHERE employee_id = $1 ORDER BY illness_code",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub relation: String,
    pub province_code: Option<String>,
    pub location_code: Option<String>,
    pub employee_code: Option<String>,
    pub special_type: Option<String>,
    pub insurance_id: Uuid,
    pub policy_start_date: NaiveDate,
}
