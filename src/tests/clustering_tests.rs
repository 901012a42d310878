use super::build_state;
use crate::clustering::{
    attempt_margin, best_result, compare_results, distance, find_max, jaccard_distance, match_clusters,
    parse_sort_order, physical_distance, ClusterOptions, Clustering, DissimilarityCell, DistanceWeights,
    HierarchicalClusterMover, MergeParams, ResultKey,
};
use crate::cost::{CostCalculator, CostParams, CostResult, VolumeCost};
use crate::error::PlanError;
use crate::model::MigrationState;
use crate::runner::{PlanRequest, Planner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Two pairs of identical files, each pair split across both volumes.
fn paired_state() -> MigrationState {
    build_state(
        &[0.5, 0.5],
        &[
            (0, 1, &[("aa", 10), ("bb", 10)]),
            (1, 2, &[("aa", 10), ("bb", 10)]),
            (0, 3, &[("cc", 10), ("dd", 10)]),
            (1, 4, &[("cc", 10), ("dd", 10)]),
        ],
    )
}

fn merge_params(wt: f64, load_balance: bool, approx_size: f64) -> MergeParams {
    MergeParams {
        weights: DistanceWeights { wt, num_volumes: 2, use_new_metric: false },
        gap: 0.0,
        max_offers: 10,
        load_balance,
        lb_sizes: vec![50.0, 50.0],
        approx_size,
    }
}

fn result(deleted: u64, traffic: u64, traffic_valid: bool) -> CostResult {
    let params = CostParams {
        allowed_traffic: 0,
        margin: 5.0,
        load_balance: false,
        desired_pct: Vec::new(),
        validate: false,
    };
    let volume = VolumeCost { init_size: 100, deleted, traffic, ..VolumeCost::default() };
    let mut result = CostResult::from_volumes(vec!["v".to_string()], vec![volume], &params);
    result.traffic_valid = traffic_valid;
    result
}

#[test]
fn test_jaccard_distance() {
    assert!((jaccard_distance(&[1, 2, 3], &[2, 3, 4]) - 0.5).abs() < f64::EPSILON);
    assert!((jaccard_distance(&[1, 2], &[1, 2]) - 0.0).abs() < f64::EPSILON);
    assert!((jaccard_distance(&[1], &[2]) - 1.0).abs() < f64::EPSILON);
    assert!((jaccard_distance(&[], &[]) - 0.0).abs() < f64::EPSILON);
}

#[test]
fn test_distance_blends_physical_and_content() {
    let cell = DissimilarityCell { jaccard: Some(0.5), origins: BTreeMap::from([(0, 10), (1, 10)]) };
    let old = DistanceWeights { wt: 0.5, num_volumes: 2, use_new_metric: false };
    let new = DistanceWeights { use_new_metric: true, ..old };

    assert!((physical_distance(&cell, &old) - 1.0).abs() < 1e-12);
    assert!((distance(&cell, &old).unwrap() - 0.75).abs() < 1e-12);
    assert!((physical_distance(&cell, &new) - 0.75).abs() < 1e-12);
    assert!((distance(&cell, &new).unwrap() - 0.625).abs() < 1e-12);
    assert_eq!(distance(&DissimilarityCell::default(), &old), None);
}

#[test]
fn test_find_max_prefers_first() {
    assert_eq!(find_max(&[vec![1, 5], vec![5, 2]]), Some((0, 1)));
    assert_eq!(find_max(&[vec![0, 0]]), Some((0, 0)));
    assert_eq!(find_max(&[vec![-1, -1], vec![-1, -1]]), None);
}

#[test]
fn test_attempt_margin_relaxes_after_second_attempt() {
    assert!((attempt_margin(5.0, 5.0, 0) - 5.0).abs() < 1e-12);
    assert!((attempt_margin(5.0, 5.0, 1) - 5.0).abs() < 1e-12);
    assert!((attempt_margin(5.0, 5.0, 2) - 5.25).abs() < 1e-12);
    assert!((attempt_margin(5.0, 5.0, 3) - 5.5125).abs() < 1e-12);
}

#[test]
fn test_clustering_groups_identical_files() {
    let state = paired_state();
    let mut clustering = Clustering::new(&state);
    let mut rng = StdRng::seed_from_u64(7);

    assert!(clustering.attempt(&merge_params(1.0, false, 40.0), 5.0, 2, &mut rng));
    let clusters = clustering.clusters();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].files(), &BTreeSet::from([0, 1]));
    assert_eq!(clusters[1].files(), &BTreeSet::from([2, 3]));
    assert_eq!(clusters[0].size(), 20);

    let target = match_clusters(&state, &state.mapping(), &clusters);
    assert_eq!(target, vec![BTreeSet::from([0, 1]), BTreeSet::from([2, 3])]);
}

#[test]
fn test_unreachable_margin_fails_after_all_attempts() {
    let state = build_state(
        &[0.5, 0.5],
        &[(0, 1, &[("aa", 10)]), (0, 2, &[("bb", 10)]), (1, 3, &[("cc", 10)])],
    );
    let mut clustering = Clustering::new(&state);
    let mut rng = StdRng::seed_from_u64(1);

    let err = clustering.run(&merge_params(0.5, true, 30.0), 0.0, 5.0, 3, 2, &mut rng).unwrap_err();
    assert!(matches!(err, PlanError::MarginNotReached { attempts: 3, .. }));

    let report = clustering.run(&merge_params(0.5, true, 30.0), 20.0, 5.0, 3, 2, &mut rng).unwrap();
    assert_eq!(report.attempts(), 1);
    assert_eq!(clustering.active_count(), 2);
}

#[test]
fn test_cluster_mover_beats_doing_nothing() {
    let state = paired_state();
    let mut mover = HierarchicalClusterMover::new(ClusterOptions {
        wts: vec![100.0],
        seeds: vec![3],
        gaps: vec![0.0],
        eps: 5.0,
        max_attempts: 10,
        max_offers: 10,
        load_balance: false,
        lb_sizes: Vec::new(),
        use_new_dist_metric: false,
        sort_order: parse_sort_order("traffic_valid lb_valid deletion lb_score traffic").unwrap(),
    });
    let calculator = CostCalculator::new(None, "test");
    let params = CostParams {
        allowed_traffic: 0,
        margin: 5.0,
        load_balance: true,
        desired_pct: Vec::new(),
        validate: true,
    };
    let request = PlanRequest {
        budget: 0,
        margin: 5.0,
        iteration: 1,
        num_iterations: 1,
        calculator: &calculator,
        params: &params,
    };

    let outcome = mover.plan(&state, &request).unwrap();
    let tag = outcome.tag.unwrap();
    assert!((tag.wt - 100.0).abs() < f64::EPSILON);
    assert_eq!(tag.seed, 3);
    assert_eq!(outcome.target, vec![BTreeSet::from([0, 1]), BTreeSet::from([2, 3])]);
    assert!(outcome.steps.is_empty());
}

#[test]
fn test_arranged_lb_sizes() {
    let options = ClusterOptions {
        wts: vec![50.0],
        seeds: vec![1],
        gaps: vec![0.0],
        eps: 5.0,
        max_attempts: 1,
        max_offers: 1,
        load_balance: true,
        lb_sizes: vec![20.0, 50.0, 30.0],
        use_new_dist_metric: false,
        sort_order: vec![ResultKey::Deletion],
    };
    let mover = HierarchicalClusterMover::new(options.clone());
    assert_eq!(mover.arranged_lb_sizes(3), vec![50.0, 30.0, 20.0]);

    let even = HierarchicalClusterMover::new(ClusterOptions { lb_sizes: Vec::new(), ..options });
    assert_eq!(even.arranged_lb_sizes(4), vec![25.0; 4]);
}

#[test]
fn test_result_ranking() {
    let valid = result(10, 5, true);
    let over_budget = result(50, 500, false);
    let default_order = parse_sort_order("traffic_valid lb_valid deletion lb_score traffic").unwrap();

    assert_eq!(compare_results(&default_order, &valid, &over_budget), Ordering::Greater);
    let by_deletion = parse_sort_order("deletion,traffic").unwrap();
    assert_eq!(compare_results(&by_deletion, &valid, &over_budget), Ordering::Less);

    let cheaper = result(10, 1, true);
    assert_eq!(best_result(&default_order, [&valid, &over_budget, &cheaper]), Some(2));
    assert_eq!(best_result(&default_order, [&valid, &valid.clone()]), Some(0), "earliest wins ties");
    assert_eq!(best_result(&default_order, std::iter::empty::<&CostResult>()), None);
}

#[test]
fn test_parse_sort_order_rejects_bad_keys() {
    assert!(parse_sort_order("deletion bogus").is_err());
    assert!(parse_sort_order("traffic traffic").is_err());
    assert!(parse_sort_order("  ").is_err());
    assert_eq!(parse_sort_order("lb_score").unwrap(), vec![ResultKey::LbScore]);
}
