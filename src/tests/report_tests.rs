use super::{build_state, temp_dir};
use crate::cost::{CostCalculator, CostInput, CostParams};
use crate::greedy::Phase;
use crate::model::{MigrationState, Transfer};
use crate::report::{parse_plan, replay_plan, PlanBlock, PlanReport, TransferLog, VOLUME_HEADER};
use crate::runner::{ClusterTag, PlanStep};
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

fn params() -> CostParams {
    CostParams { allowed_traffic: 1000, margin: 5.0, load_balance: true, desired_pct: Vec::new(), validate: true }
}

fn sample_state() -> MigrationState {
    build_state(
        &[0.5, 0.5],
        &[(0, 11, &[("aa", 100), ("bb", 50)]), (0, 12, &[("bb", 50)]), (1, 13, &[("cc", 40)])],
    )
}

#[test]
fn test_plan_report_round_trips_through_replay() {
    let dir = temp_dir();
    let path = dir.join("reports").join("result_migration_plan.csv");
    let state = sample_state();
    let initial = state.mapping();
    let mut target = initial.clone();
    target[0].remove(&1);
    target[1].insert(1);

    let calculator = CostCalculator::new(None, "test");
    let cost = calculator.evaluate(&state, CostInput::plan(&initial, &target), &params());
    let tag = ClusterTag { wt: 50.0, gap: 10.0, seed: 3, eps: 5.0, attempts: 2 };

    let mut report = PlanReport::create(&path, "host-a").unwrap();
    assert_eq!(report.path(), path.as_path());
    report
        .write_block(
            &state.catalog,
            &PlanBlock {
                label: "1_m1_c0",
                max_traffic: 1000,
                tag: Some(tag),
                margin: 5.0,
                elapsed: Duration::from_millis(1500),
                initial: &initial,
                target: &target,
                cost: &cost,
            },
        )
        .unwrap();
    let summary = report.finish().unwrap();
    assert_eq!(summary.blocks, 1);
    assert_eq!(summary.traffic, cost.traffic);
    assert_eq!(summary.init_size, 190);
    assert_eq!(summary.deletion(), cost.deletion_bytes());

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("host-a,1_m1_c0,1000,50,10,3,5,5,1,2,1.500"));
    assert!(contents.contains("vol0,11-12,11,"));
    assert!(contents.contains("Summed results:"));

    let blocks = parse_plan(&contents, &state).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].label, "1_m1_c0");
    assert_eq!(blocks[0].max_traffic, 1000);
    assert_eq!(blocks[0].initial, initial);
    assert_eq!(blocks[0].target, target);
    assert_eq!(blocks[0].skipped, 0);

    let replayed = replay_plan(&path, &state, &calculator, &params()).unwrap();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].1.volumes, cost.volumes);
    assert!(replayed[0].1.traffic_valid);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_parse_plan_skips_unknown_files() {
    let state = sample_state();
    let contents = format!(
        "Server name, Iteration num\nhost,2_m2_c0,77\n\n{VOLUME_HEADER}\nvol0,11-99,11\nvol1,13,12-13\n,,,,\n"
    );
    let blocks = parse_plan(&contents, &state).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].label, "2_m2_c0");
    assert_eq!(blocks[0].max_traffic, 77);
    assert_eq!(blocks[0].skipped, 1);
    assert_eq!(blocks[0].initial[0], BTreeSet::from([0]));
    assert_eq!(blocks[0].target[1], BTreeSet::from([1, 2]));

    let unknown_volume = format!("{VOLUME_HEADER}\nvol7,11,11\n");
    assert!(parse_plan(&unknown_volume, &state).is_err());
}

#[test]
fn test_transfer_log_rows() {
    let dir = temp_dir();
    let path = dir.join("result_transfers.csv");
    let state = sample_state();
    let step = PlanStep {
        transfer: Transfer {
            source: 0,
            target: 1,
            file: 0,
            file_sn: 11,
            replicated: 50,
            deleted: 0,
            moved: 150,
            traffic: 150,
        },
        phase: Phase::Reduce,
        margin: 0.05,
        total_traffic: 150,
        elapsed: Duration::from_millis(250),
    };

    let mut log = TransferLog::create(&path).unwrap();
    log.write_steps("1_m1_c0", &state, &[step, step]).unwrap();
    assert_eq!(log.rows(), 2);
    log.finish().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Iteration,Source,Target"));
    assert_eq!(lines[1], "1_m1_c0,vol0,vol1,11,50,0,150,150,150,0.250,optimize");

    fs::remove_dir_all(&dir).unwrap();
}
