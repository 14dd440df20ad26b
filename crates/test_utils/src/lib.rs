//! Test Utilities Crate
//!
//! Shared test infrastructure for the TPA pricing engine.
//!
//! # Modules
//!
//! - `fixtures`: fixed dates and [`TestWorld`], the engine wired over mocks
//! - `builders`: builders for catalog rows, employees, policies and lines
//! - `database`: PostgreSQL testcontainer with migrations applied
//! - `assertions`: balance and ceiling invariant checks
//! - `generators`: property-based strategies

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
