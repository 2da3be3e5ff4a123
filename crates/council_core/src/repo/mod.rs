//! Record data access: contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Define primary-key CRUD contracts used by the dispatcher.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod record_repo;
pub mod sqlite_store;
