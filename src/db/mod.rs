//! Database module
//!
//! Row models for every table and `DbOperations`, the data access layer
//! wrapping the shared Postgres pool. Schema lives in `migrations/`.

pub mod models;
pub mod operations;

pub use models::{User, UserSession};
pub use operations::{DbOperations, DbPoolStatus};
