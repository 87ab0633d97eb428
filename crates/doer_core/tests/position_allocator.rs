use doer_core::{
    needs_rebalance, position_at_end, position_between, rebalance, scope_health, ScopeHealth,
    POSITION_GAP,
};
use proptest::prelude::*;
use proptest::test_runner::Config;

#[test]
fn append_adds_exactly_one_gap() {
    assert_eq!(position_at_end(None), POSITION_GAP);
    for last in [-1e9, -3.5, 0.0, 0.25, 65536.0, 1e12] {
        let next = position_at_end(Some(last));
        assert!(next > last);
        assert_eq!(next, last + POSITION_GAP);
    }
}

#[test]
fn between_covers_every_neighbour_shape() {
    assert_eq!(position_between(None, None), 65536.0);
    assert_eq!(position_between(Some(131072.0), None), 196608.0);
    assert_eq!(position_between(None, Some(65536.0)), 32768.0);
    assert_eq!(position_between(Some(65536.0), Some(131072.0)), 98304.0);
    assert_eq!(position_between(Some(-4.0), Some(10.0)), 3.0);
}

#[test]
fn repeated_top_insertion_degenerates_after_seventeen_halvings() {
    let mut positions = vec![POSITION_GAP];
    let mut degenerate_after = None;
    for iteration in 1..=40 {
        let top = position_between(None, Some(positions[0]));
        positions.insert(0, top);
        if needs_rebalance(&positions) {
            degenerate_after = Some(iteration);
            break;
        }
    }

    let iteration = degenerate_after.expect("top insertion should degenerate");
    assert!((16..=20).contains(&iteration), "degenerated after {iteration}");
    assert_eq!(iteration, 17);
    assert!(positions[0] < 1.0);
    assert_eq!(scope_health(&positions), ScopeHealth::Degenerate);
}

#[test]
fn rebalance_five_items_yields_gap_multiples() {
    let fresh = rebalance(5);
    assert_eq!(fresh, vec![65536.0, 131072.0, 196608.0, 262144.0, 327680.0]);
    assert!(!needs_rebalance(&fresh));
    assert!(rebalance(0).is_empty());
}

#[test]
fn fewer_than_two_positions_never_degenerate() {
    assert!(!needs_rebalance(&[]));
    assert!(!needs_rebalance(&[0.0001]));
    assert_eq!(scope_health(&[42.0]), ScopeHealth::Healthy);
}

#[test]
fn section_scenario_places_middle_insert_between_appends() {
    let a = position_at_end(None);
    let b = position_at_end(Some(a));
    let c = position_between(Some(a), Some(b));
    assert_eq!((a, b, c), (65536.0, 131072.0, 98304.0));

    let mut rows = vec![("B", b), ("A", a), ("C", c)];
    rows.sort_by(|left, right| left.1.total_cmp(&right.1));
    let order: Vec<&str> = rows.iter().map(|row| row.0).collect();
    assert_eq!(order, vec!["A", "C", "B"]);
}

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn sorted_positions_reproduce_insertion_order(
        slots in proptest::collection::vec(any::<prop::sample::Index>(), 1..40)
    ) {
        // Intended order holds (label, position); labels are insertion counters.
        let mut intended: Vec<(usize, f64)> = Vec::new();
        for (label, slot) in slots.iter().enumerate() {
            let index = slot.index(intended.len() + 1);
            let before = index.checked_sub(1).map(|previous| intended[previous].1);
            let after = intended.get(index).map(|entry| entry.1);
            let position = position_between(before, after);
            intended.insert(index, (label, position));
        }

        let mut sorted = intended.clone();
        sorted.sort_by(|left, right| left.1.total_cmp(&right.1));
        let intended_labels: Vec<usize> = intended.iter().map(|entry| entry.0).collect();
        let sorted_labels: Vec<usize> = sorted.iter().map(|entry| entry.0).collect();
        prop_assert_eq!(intended_labels, sorted_labels);
    }

    #[test]
    fn append_is_strictly_increasing(last in -1e12_f64..1e12_f64) {
        let next = position_at_end(Some(last));
        prop_assert!(next > last);
        prop_assert_eq!(next, last + POSITION_GAP);
    }

    #[test]
    fn midpoint_lies_strictly_inside_wide_gaps(
        before in -1e9_f64..1e9_f64,
        width in 1.0_f64..1e6_f64
    ) {
        let after = before + width;
        let middle = position_between(Some(before), Some(after));
        prop_assert!(before < middle && middle < after);
    }
}
