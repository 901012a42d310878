use super::{build_state, temp_dir};
use crate::changes::{ChangeApplicator, ChangeStream, InsertPolicy};
use crate::greedy::{GreedyMover, GreedyOptions};
use crate::runner::{iteration_margin, replay, ChangePosition, RunSettings, Runner, TrafficBudget};
use crate::split::SplitOrder;
use std::fs;
use std::path::Path;
use std::time::Duration;

fn greedy() -> Box<GreedyMover> {
    Box::new(GreedyMover::new(GreedyOptions { traffic_handicap: 1.2, time_limit: Duration::from_secs(60) }))
}

fn settings(dir: &Path, change_pos: ChangePosition, iterations: usize, change_iterations: usize) -> RunSettings {
    RunSettings {
        traffic_pct: 100.0,
        margin: 5.0,
        iterations,
        change_iterations,
        runs: 1,
        change_pos,
        carry_traffic: false,
        converge_margin: false,
        split_order: SplitOrder::SoftLb,
        load_balance: true,
        desired_pct: vec![50.0, 50.0],
        output_prefix: dir.join("result").display().to_string(),
        cache_scope: "test".to_string(),
        transfer_log: true,
    }
}

/// Change file that adds one single-file snapshot and then removes it.
fn add_then_remove(dir: &Path) -> ChangeApplicator {
    let snapshot = dir.join("U1_H7_IF42_TS100");
    fs::write(&snapshot, "B, 1, 00aa, 1, 1\nF, 1, vol_U1_H7_IF42_TS100, 1, 1, 1, 30\n").unwrap();
    let changes = dir.join("changes.txt");
    fs::write(&changes, format!("add:{0},del:\nadd:,del:{0}\n", snapshot.display())).unwrap();
    ChangeApplicator::new(ChangeStream::open(&changes).unwrap(), InsertPolicy::Random, 22, vec![1, 1])
}

#[test]
fn test_change_position_parsing() {
    for pos in [
        ChangePosition::MigrationAfterChanges,
        ChangePosition::MigrationBeforeChanges,
        ChangePosition::MigrationWithContinuousChanges,
        ChangePosition::NaiveSplit,
        ChangePosition::LbSplit,
        ChangePosition::SmartSplit,
        ChangePosition::OnlyChanges,
    ] {
        assert_eq!(ChangePosition::try_from(pos.as_str()), Ok(pos));
    }
    assert!(ChangePosition::try_from("sometimes").is_err());

    assert_eq!(ChangePosition::MigrationAfterChanges.changes_before(3), 2);
    assert_eq!(ChangePosition::OnlyChanges.changes_before(3), 3);
    assert_eq!(ChangePosition::SmartSplit.changes_before(3), 0);
    assert!(ChangePosition::MigrationBeforeChanges.changes_after());
    assert!(!ChangePosition::OnlyChanges.migrates());
    assert!(ChangePosition::LbSplit.plans_up_front());
    assert!(!ChangePosition::SmartSplit.plans_up_front());
}

#[test]
fn test_traffic_budget_without_carry() {
    let mut budget = TrafficBudget::new(100, 3, false);
    assert_eq!(budget.next_iteration(), 33);
    budget.spend(33, 10);
    assert_eq!(budget.next_iteration(), 33);
    assert_eq!(budget.remaining(), 90);
    assert_eq!(budget.total(), 100);
}

#[test]
fn test_traffic_budget_carries_leftovers() {
    let mut budget = TrafficBudget::new(100, 3, true);
    assert_eq!(budget.next_iteration(), 34, "the division remainder goes to the first iteration");
    budget.spend(34, 10);
    assert_eq!(budget.next_iteration(), 57);
    budget.spend(57, 80);
    assert_eq!(budget.next_iteration(), 33, "overspending carries nothing");
    assert_eq!(budget.remaining(), 10);
}

#[test]
fn test_iteration_margin() {
    assert!((iteration_margin(10.0, false, 1, 2) - 10.0).abs() < f64::EPSILON);
    assert!((iteration_margin(10.0, true, 1, 2) - 12.5).abs() < 1e-12);
    assert!((iteration_margin(10.0, true, 2, 2) - 10.0).abs() < 1e-12);
}

#[test]
fn test_greedy_run_writes_reports_and_replays() {
    let dir = temp_dir();
    let mut state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 100 * 1024)])]);
    let before = state.clone();
    let settings = settings(&dir, ChangePosition::MigrationWithContinuousChanges, 1, 0);

    let mut runner = Runner::new(greedy(), settings.clone(), None, None);
    let summaries = runner.run(&mut state).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].blocks, 1);
    assert_eq!(summaries[0].traffic, 100 * 1024);
    assert!(summaries[0].traffic_valid);
    assert_eq!(state.catalog.volume_of(0), Some(1));
    assert_eq!(state.epochs.label(), "1_m1_c0");

    let plan_path = dir.join("result_migration_plan.csv");
    let plan = fs::read_to_string(&plan_path).unwrap();
    assert!(plan.contains(",1_m1_c0,102400,"));
    let transfers = fs::read_to_string(dir.join("result_transfers.csv")).unwrap();
    assert_eq!(transfers.lines().count(), 2);

    let replayed = replay(&before, &plan_path, &settings, None).unwrap();
    assert_eq!(replayed.blocks, 1);
    assert_eq!(replayed.traffic, 100 * 1024);
    assert!(dir.join("result_replay_migration_plan.csv").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_multiple_runs_get_their_own_reports() {
    let dir = temp_dir();
    let mut state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 100)]), (1, 2, &[("bb", 100)])]);
    let mut settings = settings(&dir, ChangePosition::MigrationWithContinuousChanges, 1, 0);
    settings.runs = 2;
    settings.transfer_log = false;

    let summaries = Runner::new(greedy(), settings, None, None).run(&mut state).unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(dir.join("result_run1_migration_plan.csv").exists());
    assert!(dir.join("result_run2_migration_plan.csv").exists());
    assert!(!dir.join("result_run1_transfers.csv").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_changes_after_migration() {
    let dir = temp_dir();
    let mut state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 10)]), (1, 2, &[("bb", 10)])]);
    let mut settings = settings(&dir, ChangePosition::MigrationBeforeChanges, 1, 2);
    settings.traffic_pct = 0.0;
    let changes = add_then_remove(&dir);

    let summaries = Runner::new(greedy(), settings, None, Some(changes)).run(&mut state).unwrap();
    assert_eq!(summaries[0].blocks, 2);
    assert_eq!(summaries[0].traffic, 0);
    assert_eq!(state.epochs.label(), "2_m1_c2");
    assert_eq!(state.total_size(), 20, "the added file was removed again");

    let plan = fs::read_to_string(dir.join("result_migration_plan.csv")).unwrap();
    assert!(plan.contains(",1_m1_c1,"));
    assert!(plan.contains(",2_m1_c2,0,"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_only_changes_never_migrates() {
    let dir = temp_dir();
    let mut state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 1000)])]);
    let changes = add_then_remove(&dir);
    let settings = settings(&dir, ChangePosition::OnlyChanges, 3, 2);

    let summaries = Runner::new(greedy(), settings, None, Some(changes)).run(&mut state).unwrap();
    assert_eq!(summaries[0].blocks, 2);
    assert_eq!(state.epochs.label(), "2_m0_c2");
    assert_eq!(state.catalog.volume_of(0), Some(0));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_naive_split_hands_out_planned_transfers() {
    let dir = temp_dir();
    let mut state = build_state(&[0.5, 0.5], &[(0, 1, &[("aa", 100)]), (0, 2, &[("bb", 100)])]);
    let mut settings = settings(&dir, ChangePosition::NaiveSplit, 2, 0);
    settings.transfer_log = false;

    let summaries = Runner::new(greedy(), settings, None, None).run(&mut state).unwrap();
    assert_eq!(summaries[0].blocks, 2);
    assert_eq!(summaries[0].traffic, 100);
    assert_eq!(state.volume_sizes(), &[100, 100]);
    assert_eq!(state.epochs.label(), "2_m2_c0");

    fs::remove_dir_all(&dir).unwrap();
}
