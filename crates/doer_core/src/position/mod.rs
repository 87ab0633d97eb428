//! Fractional ordering keys for user-ordered lists.
//!
//! # Responsibility
//! - Compute `position` values for append, insert-between and move.
//! - Detect key-space degeneration and produce fresh evenly spaced keys.
//!
//! # Invariants
//! - Allocation is pure and infallible for finite input.
//! - Positions are only comparable within one `OrderingScope`.

pub mod allocator;
