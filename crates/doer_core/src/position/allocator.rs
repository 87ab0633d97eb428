//! Gap-based position allocator.
//!
//! # Responsibility
//! - Produce `f64` ordering keys spaced by `POSITION_GAP`.
//! - Report when adjacent keys are closer than `MIN_POSITION_GAP`.
//!
//! # Invariants
//! - `position_at_end(Some(p)) == p + POSITION_GAP` exactly.
//! - `rebalance(n)[i] == initial_position(i)` for every `i < n`.
//! - Callers pass `before < after` from the same scope. This is not checked
//!   here; see `OrderingService` for the validated entry points.

/// Default spacing between consecutive positions.
pub const POSITION_GAP: f64 = 65536.0;

/// Adjacent positions closer than this mark the scope as degenerate.
pub const MIN_POSITION_GAP: f64 = 1.0;

/// Health of one ordering scope's key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeHealth {
    /// Every adjacent pair is at least `MIN_POSITION_GAP` apart.
    Healthy,
    /// At least one adjacent pair is too close; rebalance before trusting
    /// further inserts.
    Degenerate,
}

/// Returns the position for appending after `last_position`.
///
/// `None` means the scope is empty.
pub fn position_at_end(last_position: Option<f64>) -> f64 {
    match last_position {
        Some(last) => {
            debug_assert!(last.is_finite(), "last position must be finite");
            last + POSITION_GAP
        }
        None => POSITION_GAP,
    }
}

/// Returns a position strictly between `before` and `after`.
///
/// | before | after | result |
/// |---|---|---|
/// | `None` | `None` | `POSITION_GAP` |
/// | `Some(b)` | `None` | `b + POSITION_GAP` |
/// | `None` | `Some(a)` | `a / 2` |
/// | `Some(b)` | `Some(a)` | `(b + a) / 2` |
///
/// The result only preserves order when `before < after`.
pub fn position_between(before: Option<f64>, after: Option<f64>) -> f64 {
    debug_assert!(
        before.map_or(true, f64::is_finite) && after.map_or(true, f64::is_finite),
        "neighbour positions must be finite"
    );
    match (before, after) {
        (None, None) => POSITION_GAP,
        (Some(before), None) => before + POSITION_GAP,
        (None, Some(after)) => after / 2.0,
        (Some(before), Some(after)) => (before + after) / 2.0,
    }
}

/// Returns the evenly spaced position for slot `index` of a fresh list.
pub fn initial_position(index: usize) -> f64 {
    (index as f64 + 1.0) * POSITION_GAP
}

/// Returns whether any two adjacent positions are closer than
/// `MIN_POSITION_GAP`.
///
/// `positions` must be sorted ascending. Fewer than two positions never need
/// a rebalance.
pub fn needs_rebalance(positions: &[f64]) -> bool {
    positions
        .windows(2)
        .any(|pair| pair[1] - pair[0] < MIN_POSITION_GAP)
}

/// Classifies a sorted scope as healthy or degenerate.
pub fn scope_health(positions: &[f64]) -> ScopeHealth {
    if needs_rebalance(positions) {
        ScopeHealth::Degenerate
    } else {
        ScopeHealth::Healthy
    }
}

/// Returns `count` fresh positions: `GAP, 2*GAP, 3*GAP, ...`.
pub fn rebalance(count: usize) -> Vec<f64> {
    (0..count).map(initial_position).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        initial_position, needs_rebalance, position_at_end, position_between, rebalance,
        scope_health, ScopeHealth, POSITION_GAP,
    };

    #[test]
    fn append_to_empty_scope_uses_gap() {
        assert_eq!(position_at_end(None), POSITION_GAP);
        assert_eq!(position_at_end(Some(10.5)), 10.5 + POSITION_GAP);
    }

    #[test]
    fn between_follows_policy_table() {
        assert_eq!(position_between(None, None), 65536.0);
        assert_eq!(position_between(Some(100.0), None), 100.0 + 65536.0);
        assert_eq!(position_between(None, Some(100.0)), 50.0);
        assert_eq!(position_between(Some(65536.0), Some(131072.0)), 98304.0);
    }

    #[test]
    fn short_inputs_never_need_rebalance() {
        assert!(!needs_rebalance(&[]));
        assert!(!needs_rebalance(&[0.25]));
    }

    #[test]
    fn gap_exactly_at_threshold_is_healthy() {
        assert!(!needs_rebalance(&[1.0, 2.0]));
        assert!(needs_rebalance(&[1.0, 1.5]));
        assert_eq!(scope_health(&[1.0, 2.0]), ScopeHealth::Healthy);
        assert_eq!(scope_health(&[1.0, 1.5]), ScopeHealth::Degenerate);
    }

    #[test]
    fn rebalance_matches_initial_positions() {
        let fresh = rebalance(3);
        assert_eq!(fresh, vec![65536.0, 131072.0, 196608.0]);
        for (index, position) in fresh.iter().enumerate() {
            assert_eq!(*position, initial_position(index));
        }
        assert!(rebalance(0).is_empty());
    }
}
