//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into reorder use-cases.
//! - Keep UI-facing callers decoupled from storage details.

pub mod ordering_service;
