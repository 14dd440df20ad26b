//! Domain Adapters
//!
//! PostgreSQL implementations of the domain ports. Each adapter wraps a
//! repository, converts rows into domain types and maps
//! [`crate::DatabaseError`] into `PortError`.
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresCatalogAdapter;
//! use domain_pricing::PricingCatalogPort;
//!
//! let catalog: Arc<dyn PricingCatalogPort> = Arc::new(PostgresCatalogAdapter::new(pool));
//! let item = catalog.get_item(item_id).await?;
//! ```

pub mod catalog;
pub mod ceiling;
pub mod invoice;
pub mod employee;
mod convert;

pub use catalog::PostgresCatalogAdapter;
pub use ceiling::PostgresCeilingStore;
pub use invoice::PostgresInvoiceAdapter;
pub use employee::PostgresEmployeeAdapter;

use core_kernel::HealthCheckResult;
use sqlx::PgPool;

/// Runs `SELECT 1` against the pool
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheckResult::healthy(adapter_id, u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, format!("Database error: {}", e)),
    }
}
