use super::defaults::{
    DEFAULT_CACHE_PATH, DEFAULT_CONFIG_PATH, DEFAULT_EPS, DEFAULT_LOCK_ATTEMPTS, DEFAULT_LOCK_SLEEP_MS,
    DEFAULT_MARGIN, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_OFFERS, DEFAULT_OUTPUT_PREFIX,
    DEFAULT_RESULT_SORT_ORDER, DEFAULT_SPLIT_SORT_ORDER, DEFAULT_TIME_LIMIT_SECS, DEFAULT_TRAFFIC_HANDICAP,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LogFormat {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("invalid log format: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PlannerConfig {
    pub config_path: String,
    pub cache_path: String,
    pub use_cache: bool,
    pub output_prefix: String,
    pub log_format: LogFormat,
    /// Per-volume balance margin, in percent.
    pub margin: f64,
    /// Clustering margin relaxation per failed attempt, in percent.
    pub eps: f64,
    pub max_attempts: usize,
    pub max_offers: usize,
    /// Plan iteration `i` of `n` at `margin * (1.5 - 0.5 * i / n)`.
    pub converge_margin: bool,
    pub use_new_dist_metric: bool,
    /// Unspent traffic of an iteration goes to the next one.
    pub carry_traffic: bool,
    pub traffic_handicap: f64,
    pub time_limit_secs: u64,
    pub lock_attempts: u32,
    pub lock_sleep_ms: u64,
    pub strict_removals: bool,
    pub filter_blocks: bool,
    pub result_sort_order: String,
    pub split_sort_order: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            use_cache: true,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            log_format: LogFormat::Text,
            margin: DEFAULT_MARGIN,
            eps: DEFAULT_EPS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_offers: DEFAULT_MAX_OFFERS,
            converge_margin: false,
            use_new_dist_metric: false,
            carry_traffic: false,
            traffic_handicap: DEFAULT_TRAFFIC_HANDICAP,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
            lock_sleep_ms: DEFAULT_LOCK_SLEEP_MS,
            strict_removals: false,
            filter_blocks: false,
            result_sort_order: DEFAULT_RESULT_SORT_ORDER.to_string(),
            split_sort_order: DEFAULT_SPLIT_SORT_ORDER.to_string(),
        }
    }
}

impl PlannerConfig {
    /// Defaults, then environment overrides, then the config file.
    ///
    /// `config_path` replaces both the default and `DP_CONFIG_PATH`. The
    /// result still has to go through command-line overrides and
    /// [`PlannerConfig::validate`].
    pub(crate) fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DP_CONFIG_PATH") {
            config.config_path = path;
        }
        if let Some(path) = config_path {
            config.config_path = path.to_string();
        }
        if let Ok(path) = std::env::var("DP_CACHE_PATH") {
            config.cache_path = path;
        }
        if let Ok(prefix) = std::env::var("DP_OUTPUT_PREFIX") {
            config.output_prefix = prefix;
        }
        if let Ok(format) = std::env::var("DP_LOG_FORMAT") {
            config.log_format = LogFormat::try_from(format.as_str()).map_err(anyhow::Error::msg)?;
        }

        let cfg_path = Path::new(&config.config_path);
        if cfg_path.exists() {
            let contents = fs::read_to_string(cfg_path)
                .with_context(|| format!("Failed to read config file: {}", config.config_path))?;
            config.parse_ini(&contents);
        }

        Ok(config)
    }
}
