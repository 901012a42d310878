use super::temp_dir;
use crate::model::StateOptions;
use crate::workload::{
    load_state, parse_files_index, parse_line, parse_snapshot_name, parse_volume_list, read_workload,
    WorkloadLine,
};
use std::fs;

#[test]
fn test_parse_block_line() {
    let line = parse_line("B, 7, 0a1b2c, 2, 1, 3").unwrap();
    assert_eq!(line, Some(WorkloadLine::Block { sn: 7, fingerprint: "0a1b2c".to_string() }));
}

#[test]
fn test_parse_file_line() {
    let line = parse_line("F, 3, vol_U1_H2_IF9_TS5, 3, 2, 7, 4096, 8, 0\r").unwrap();
    assert_eq!(
        line,
        Some(WorkloadLine::File { sn: 3, input_id: "9".to_string(), recipe: vec![(7, 4096), (8, 4096)] }),
        "non-positive sizes fall back to 4096"
    );
}

#[test]
fn test_parse_file_line_plain_identity() {
    let line = parse_line("F, 4, vol2_f4_copy, 4, 1, 7, 10").unwrap();
    assert_eq!(line, Some(WorkloadLine::File { sn: 4, input_id: "f4".to_string(), recipe: vec![(7, 10)] }));
}

#[test]
fn test_parse_line_rejects_short_recipe() {
    assert!(parse_line("F, 3, vol_x, 3, 2, 7, 4096").is_err());
    assert_eq!(parse_line("   ").unwrap(), None);
    assert_eq!(parse_line("Z, 1, 2").unwrap(), None);
}

#[test]
fn test_parse_volume_list() {
    let volumes = parse_volume_list("# comment\n/data/a.csv, a, 0.25\n/data/b.csv, s, 0.75\n").unwrap();
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[0].name, "/data/a.csv");
    assert!((volumes[1].desired - 0.75).abs() < f64::EPSILON);

    assert!(parse_volume_list("/data/a.csv, x, 1").is_err());
    assert!(parse_volume_list("/data/a.csv, a").is_err());
    assert!(parse_volume_list("").is_err());
}

#[test]
fn test_parse_snapshot_name() {
    let id = parse_snapshot_name("U12_H3_IF77_TS1000").unwrap();
    assert_eq!(id.user, "12");
    assert_eq!(id.host, 3);
    assert_eq!(id.input_id, "77");
    assert_eq!(id.timestamp, "1000");
    assert!(parse_snapshot_name("garbage").is_none());
}

#[test]
fn test_parse_files_index() {
    let json = r#"{"1": {"3": [{"snap_name": "U1_H3_IFa_TS1"}, {"snap_name": "U1_H3_IFb_TS2"}]}}"#;
    let hosts = parse_files_index(json).unwrap();
    assert_eq!(hosts[&3], vec!["a".to_string(), "b".to_string()]);
    assert!(parse_files_index("{not json").is_err());
}

#[test]
fn test_load_state_from_workloads() {
    let dir = temp_dir();
    let first = dir.join("first.csv");
    let second = dir.join("second.csv");
    fs::write(&first, "B, 1, aaaa, 1, 1\nB, 2, bbbb, 2, 1, 2\nF, 1, v1_f1, 1, 2, 1, 100, 2, 50\n").unwrap();
    fs::write(&second, "B, 1, bbbb, 1, 5\nF, 5, v2_f5, 5, 1, 1, 50\n").unwrap();

    let workloads = read_workload(&first).unwrap();
    assert_eq!(workloads.len(), 1);
    assert_eq!(workloads[0].recipe, vec![("aaaa".to_string(), 100), ("bbbb".to_string(), 50)]);

    let volumes = parse_volume_list(&format!("{}, a, 0.5\n{}, a, 0.5", first.display(), second.display()))
        .unwrap();
    let state = load_state(volumes, StateOptions::default()).unwrap();
    assert_eq!(state.catalog.len(), 2);
    assert_eq!(state.blocks.len(), 2, "block fingerprints are interned across workloads");
    assert_eq!(state.volume_sizes(), &[150, 50]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_workload_is_fatal() {
    let volumes = parse_volume_list("/nonexistent/dedup-planner/w.csv, a, 1").unwrap();
    assert!(load_state(volumes, StateOptions::default()).is_err());
}
