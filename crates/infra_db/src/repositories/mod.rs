//! Repository implementations
//!
//! Repositories own the SQL and the row types. They use runtime-checked
//! `sqlx::query_as` with `FromRow` rows, so the crate builds without a live
//! database. Conversion into domain types happens in [`crate::adapters`].

pub mod catalog;
pub mod insurance;
pub mod invoice;
pub mod employee;

pub use catalog::CatalogRepository;
pub use insurance::InsuranceRepository;
pub use invoice::InvoiceRepository;
pub use employee::EmployeeRepository;
