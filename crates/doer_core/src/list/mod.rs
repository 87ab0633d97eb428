//! Client-side list state over the ordering core.
//!
//! # Responsibility
//! - Cache one scope's items in display order for the UI layer.
//! - Keep optimistic mutations reversible.

pub mod ordered_list;
