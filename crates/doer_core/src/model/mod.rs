//! Domain model for user-ordered projects, sections and tasks.
//!
//! # Responsibility
//! - Define canonical data structures used by core ordering logic.
//! - Define the ordering scopes positions are compared within.
//!
//! # Invariants
//! - Every item is identified by a stable `Uuid`.
//! - Every item carries exactly one `position` inside exactly one scope.

pub mod item;
pub mod scope;
