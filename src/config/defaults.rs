/// Default location of the `KEY="VALUE"` configuration file.
pub(super) const DEFAULT_CONFIG_PATH: &str = "dedup-planner.cfg";

/// Default path of the SQLite cost cache.
pub(super) const DEFAULT_CACHE_PATH: &str = "results/cache.db";

/// Every CSV report path starts with this prefix.
pub(super) const DEFAULT_OUTPUT_PREFIX: &str = "results/result";

/// Per-volume balance margin, in percent.
pub(super) const DEFAULT_MARGIN: f64 = 5.0;

/// Clustering margin relaxation per failed attempt, in percent.
pub(super) const DEFAULT_EPS: f64 = 5.0;

pub(super) const DEFAULT_MAX_ATTEMPTS: usize = 100;

pub(super) const DEFAULT_MAX_OFFERS: usize = 10;

/// The greedy engine rarely spends its whole budget, so it plans with more.
pub(super) const DEFAULT_TRAFFIC_HANDICAP: f64 = 1.2;

/// Wall-clock budget of one greedy iteration (1 hour).
pub(super) const DEFAULT_TIME_LIMIT_SECS: u64 = 3600;

pub(super) const DEFAULT_LOCK_ATTEMPTS: u32 = 40;

pub(super) const DEFAULT_LOCK_SLEEP_MS: u64 = 500;

pub(super) const DEFAULT_RESULT_SORT_ORDER: &str = "traffic_valid lb_valid deletion lb_score traffic";

pub(super) const DEFAULT_SPLIT_SORT_ORDER: &str = "soft_lb";
