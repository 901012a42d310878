use super::build_state;
use crate::cache::MemoryCache;
use crate::cost::{compute_volume_costs, cost_cache_key, CostCalculator, CostInput, CostParams};
use crate::model::{Mapping, MigrationState};
use std::collections::BTreeSet;

fn params(allowed_traffic: u64, load_balance: bool) -> CostParams {
    CostParams { allowed_traffic, margin: 5.0, load_balance, desired_pct: Vec::new(), validate: true }
}

/// vol0: file0 {aa:100, bb:50}; vol1: file1 {bb:50, cc:30}.
fn two_volume_state() -> MigrationState {
    build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 100), ("bb", 50)]), (1, 2, &[("bb", 50), ("cc", 30)])])
}

fn moved_file0(state: &MigrationState) -> Mapping {
    let mut target = state.mapping();
    target[0].remove(&0);
    target[1].insert(0);
    target
}

#[test]
fn test_identity_mapping_costs_nothing() {
    let state = two_volume_state();
    let initial = state.mapping();
    let calculator = CostCalculator::new(None, "test");
    let cost = calculator.evaluate(&state, CostInput::plan(&initial, &initial), &params(0, true));

    assert_eq!(cost.traffic, 0);
    assert_eq!(cost.deleted, 0);
    assert_eq!(cost.received, 0);
    assert_eq!(cost.init_system_size, 230);
    assert!(cost.traffic_valid);
    assert!(cost.lb_valid);
}

#[test]
fn test_move_counts_only_missing_blocks() {
    let state = two_volume_state();
    let initial = state.mapping();
    let target = moved_file0(&state);
    let calculator = CostCalculator::new(None, "test");
    let cost = calculator.evaluate(&state, CostInput::plan(&initial, &target), &params(100, false));

    assert_eq!(cost.traffic, 100, "bb already lives in vol1");
    assert_eq!(cost.received, 100);
    assert_eq!(cost.deleted, 150);
    assert_eq!(cost.deletion_bytes(), 50);
    assert_eq!(cost.final_system_size(), 180);
    assert!(cost.traffic_valid);
    assert!((cost.lb_score - 0.0).abs() < f64::EPSILON);
}

#[test]
fn test_validity_flags() {
    let state = two_volume_state();
    let initial = state.mapping();
    let target = moved_file0(&state);
    let calculator = CostCalculator::new(None, "test");

    let cost = calculator.evaluate(&state, CostInput::plan(&initial, &target), &params(99, true));
    assert!(!cost.traffic_valid);
    assert!(!cost.lb_valid);
    assert!(cost.error_message.contains("volume=vol0"), "{}", cost.error_message);

    let unchecked = CostParams { validate: false, ..params(0, true) };
    let cost = calculator.evaluate(&state, CostInput::plan(&initial, &target), &unchecked);
    assert!(cost.traffic_valid);
    assert!(cost.lb_valid);
    assert!(cost.error_message.is_empty());
}

#[test]
fn test_changes_are_not_migration_traffic() {
    let mut state = two_volume_state();
    let initial = state.mapping();
    let block = state.register_block("dd");
    state.blocks.observe_size(block, 40);
    let added_file =
        state.attach_file(crate::model::FileRecord::new(3, "f3".to_string(), vec![(block, 40)]), 1);
    state.detach_file(1);

    let target = state.mapping();
    let mut added: Mapping = vec![BTreeSet::new(), BTreeSet::new()];
    added[1].insert(added_file);
    let mut removed: Mapping = vec![BTreeSet::new(), BTreeSet::new()];
    removed[1].insert(1);

    let input = CostInput { initial: &initial, target: &target, added: Some(&added), removed: Some(&removed) };
    let volumes = compute_volume_costs(&state, input);
    assert_eq!(volumes[1].traffic, 0);
    assert_eq!(volumes[1].received, 40);
    assert_eq!(volumes[1].deleted, 80);
    assert_eq!(volumes[0], compute_volume_costs(&state, CostInput::plan(&initial, &initial))[0]);
}

#[test]
fn test_migration_overlapping_changes() {
    // vol0: aa:11, ee:13, gg:5; vol1: cc:30, ee:13. File 5 (aa) is added to
    // vol1 by a change.
    let state = build_state(
        &[0.5, 0.5],
        &[
            (0, 1, &[("aa", 11)]),
            (0, 2, &[("ee", 13)]),
            (0, 3, &[("gg", 5)]),
            (1, 4, &[("cc", 30)]),
            (1, 5, &[("ee", 13)]),
            (1, 6, &[("aa", 11)]),
        ],
    );
    let initial: Mapping = vec![BTreeSet::from([0, 1, 2]), BTreeSet::from([3, 4])];
    // Files 0..=2 migrate to vol1; the change adds 5 there and removes 4 and
    // the just-migrated 2.
    let target: Mapping = vec![BTreeSet::new(), BTreeSet::from([0, 1, 3, 5])];
    let added: Mapping = vec![BTreeSet::new(), BTreeSet::from([5])];
    let removed: Mapping = vec![BTreeSet::new(), BTreeSet::from([2, 4])];

    let input = CostInput { initial: &initial, target: &target, added: Some(&added), removed: Some(&removed) };
    let volumes = compute_volume_costs(&state, input);

    let vol1 = volumes[1];
    assert_eq!(vol1.init_size, 43);
    assert_eq!(vol1.aborted_traffic, 5, "gg was copied and then removed");
    assert_eq!(vol1.block_reuse, 13, "ee survives through the migrated file");
    assert_eq!(vol1.overlap_traffic, 11, "aa arrives both by migration and by the change");
    assert_eq!(vol1.received, 11);
    assert_eq!(vol1.deleted, 0);
    assert_eq!(vol1.traffic, 8, "(5 + 11) / 2, rounded once");

    assert_eq!(volumes[0].deleted, 29);
    assert_eq!(volumes[0].traffic, 0);
}

#[test]
fn test_aborted_transfer_costs_half() {
    let state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 9)]), (1, 2, &[("bb", 4)])]);
    let initial = state.mapping();
    let target: Mapping = vec![BTreeSet::new(), BTreeSet::from([1])];
    let removed: Mapping = vec![BTreeSet::new(), BTreeSet::from([0])];
    let added: Mapping = vec![BTreeSet::new(), BTreeSet::new()];

    let input = CostInput { initial: &initial, target: &target, added: Some(&added), removed: Some(&removed) };
    let volumes = compute_volume_costs(&state, input);
    assert_eq!(volumes[1].aborted_traffic, 9);
    assert_eq!(volumes[1].received, 0);
    assert_eq!(volumes[1].traffic, 4);
    assert_eq!(volumes[1].block_reuse, 0);
    assert_eq!(volumes[0].deleted, 9);
}

#[test]
fn test_traffic_is_symmetric_for_a_swap() {
    let state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 64)]), (1, 2, &[("bb", 64)])]);
    let initial = state.mapping();
    let swapped: Mapping = vec![initial[1].clone(), initial[0].clone()];
    let calculator = CostCalculator::new(None, "test");

    let forward = calculator.evaluate(&state, CostInput::plan(&initial, &swapped), &params(1000, true));
    let back = calculator.evaluate(&state, CostInput::plan(&swapped, &initial), &params(1000, true));
    assert_eq!(forward.traffic, 128);
    assert_eq!(forward.traffic, back.traffic);
    assert_eq!(forward.deletion_bytes(), 0);
}

#[test]
fn test_cached_evaluation_matches_direct() {
    let state = two_volume_state();
    let initial = state.mapping();
    let target = moved_file0(&state);
    let cache = MemoryCache::new();
    let calculator = CostCalculator::new(Some(&cache), "test");

    let first = calculator.evaluate(&state, CostInput::plan(&initial, &target), &params(100, true));
    let second = calculator.evaluate(&state, CostInput::plan(&initial, &target), &params(50, true));
    assert_eq!(calculator.stats(), (1, 1));
    assert_eq!(first.volumes, second.volumes);
    assert!(first.traffic_valid);
    assert!(!second.traffic_valid, "validity is re-derived from the current budget");

    let other_scope = CostCalculator::new(Some(&cache), "other");
    other_scope.evaluate(&state, CostInput::plan(&initial, &target), &params(100, true));
    assert_eq!(other_scope.stats(), (0, 1));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_cache_key_ignores_volume_order() {
    let state = two_volume_state();
    let forward: Mapping = vec![[0].into(), [1].into()];
    let reversed: Mapping = vec![[1].into(), [0].into()];
    let names = ["a".to_string(), "b".to_string()];
    let names_reversed = ["b".to_string(), "a".to_string()];

    let key = cost_cache_key(&names, &state.catalog, &forward, &forward, None, None, "s");
    assert_eq!(key, cost_cache_key(&names_reversed, &state.catalog, &reversed, &reversed, None, None, "s"));
    assert_ne!(key, cost_cache_key(&names, &state.catalog, &forward, &reversed, None, None, "s"));
    assert_ne!(key, cost_cache_key(&names, &state.catalog, &forward, &forward, None, None, "t"));
}
