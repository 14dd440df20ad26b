//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the pricing engine using SQLx.
//!
//! # Architecture
//!
//! Repositories own the SQL and the row types. Adapters implement the domain
//! ports on top of them:
//!
//! | Port | Adapter |
//! |------|---------|
//! | `PricingCatalogPort` | [`PostgresCatalogAdapter`] |
//! | `CeilingStore` | [`PostgresCeilingStore`] |
//! | `InvoicePort`, `UsageHistoryPort` | [`PostgresInvoiceAdapter`] |
//! | `EmployeePort` | [`PostgresEmployeeAdapter`] |
//!
//! Ceiling writes are compare-and-swap updates on `insurances.version`
//! inside a single transaction, so concurrent debits never oversell a
//! policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresCeilingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/tpa")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresCeilingStore::new(pool.clone());
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PostgresCatalogAdapter, PostgresCeilingStore, PostgresEmployeeAdapter, PostgresInvoiceAdapter};
