//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Implement the Data Store contract: per-item `position`, scope listing
//!   sorted by position, single and batch position updates.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Create paths validate input before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `ItemNotFound`) in
//!   addition to DB transport errors.

pub mod error;
pub mod ordering_repo;
pub mod project_repo;
mod sql;
pub mod task_repo;

pub use sql::SchemaMismatch;
