use super::temp_dir;
use crate::config::{LogFormat, PlannerConfig};
use std::fs;

#[test]
fn test_parse_ini() {
    let mut config = PlannerConfig::default();
    let ini = r#"
# planner settings
CACHE_PATH="/tmp/costs.db"
USE_CACHE="no"
OUTPUT_PREFIX="out/run"
LOG_FORMAT="json"
MARGIN="2.5"
MAX_OFFERS="3"
CONVERGE_MARGIN="yes"
CARRY_TRAFFIC="1"
LOCK_ATTEMPTS="7"
STRICT_REMOVALS="true"
SPLIT_SORT_ORDER="hard_deletion"
UNKNOWN_KEY="whatever"
"#;
    config.parse_ini(ini);
    assert_eq!(config.cache_path, "/tmp/costs.db");
    assert!(!config.use_cache);
    assert_eq!(config.output_prefix, "out/run");
    assert_eq!(config.log_format, LogFormat::Json);
    assert!((config.margin - 2.5).abs() < f64::EPSILON);
    assert_eq!(config.max_offers, 3);
    assert!(config.converge_margin);
    assert!(config.carry_traffic);
    assert_eq!(config.lock_attempts, 7);
    assert!(config.strict_removals);
    assert_eq!(config.split_sort_order, "hard_deletion");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_values_keep_defaults() {
    let mut config = PlannerConfig::default();
    config.parse_ini("MARGIN=\"lots\"\nLOG_FORMAT=\"xml\"\nMAX_ATTEMPTS=\"-1\"");
    assert!((config.margin - 5.0).abs() < f64::EPSILON);
    assert_eq!(config.log_format, LogFormat::Text);
    assert_eq!(config.max_attempts, 100);
}

#[test]
fn test_default_config_validates() {
    let config = PlannerConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = PlannerConfig::default();
    config.margin = 120.0;
    assert!(config.validate().is_err());

    let mut config = PlannerConfig::default();
    config.traffic_handicap = 0.5;
    assert!(config.validate().is_err());

    let mut config = PlannerConfig::default();
    config.result_sort_order = "deletion deletion".to_string();
    assert!(config.validate().is_err());

    let mut config = PlannerConfig::default();
    config.split_sort_order = "sideways".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_reads_config_file() {
    let dir = temp_dir();
    let path = dir.join("planner.cfg");
    fs::write(&path, "EPS=\"0.5\"\nFILTER_BLOCKS=\"yes\"\n").unwrap();

    let config = PlannerConfig::load(Some(path.to_str().unwrap())).unwrap();
    assert!((config.eps - 0.5).abs() < f64::EPSILON);
    assert!(config.filter_blocks);

    let missing = PlannerConfig::load(Some(dir.join("absent.cfg").to_str().unwrap())).unwrap();
    assert!(!missing.filter_blocks);

    fs::remove_dir_all(&dir).unwrap();
}
