use super::settings::{LogFormat, PlannerConfig};
use std::str::FromStr;
use tracing::warn;

fn is_yes(value: &str) -> bool {
    value == "yes" || value == "true" || value == "1"
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(v) => *slot = v,
        Err(_) => warn!("Ignoring invalid value {:?} for {}", value, key),
    }
}

impl PlannerConfig {
    /// Parse the simple `KEY="VALUE"` config format. Unknown keys are
    /// ignored.
    pub(crate) fn parse_ini(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "CACHE_PATH" => self.cache_path = value.to_string(),
                "USE_CACHE" => self.use_cache = is_yes(value),
                "OUTPUT_PREFIX" => self.output_prefix = value.to_string(),
                "LOG_FORMAT" => match LogFormat::try_from(value) {
                    Ok(format) => self.log_format = format,
                    Err(e) => warn!("Ignoring LOG_FORMAT: {}", e),
                },
                "MARGIN" => set_parsed(&mut self.margin, key, value),
                "EPS" => set_parsed(&mut self.eps, key, value),
                "MAX_ATTEMPTS" => set_parsed(&mut self.max_attempts, key, value),
                "MAX_OFFERS" => set_parsed(&mut self.max_offers, key, value),
                "CONVERGE_MARGIN" => self.converge_margin = is_yes(value),
                "USE_NEW_DIST_METRIC" => self.use_new_dist_metric = is_yes(value),
                "CARRY_TRAFFIC" => self.carry_traffic = is_yes(value),
                "TRAFFIC_HANDICAP" => set_parsed(&mut self.traffic_handicap, key, value),
                "TIME_LIMIT_SECS" => set_parsed(&mut self.time_limit_secs, key, value),
                "LOCK_ATTEMPTS" => set_parsed(&mut self.lock_attempts, key, value),
                "LOCK_SLEEP_MS" => set_parsed(&mut self.lock_sleep_ms, key, value),
                "STRICT_REMOVALS" => self.strict_removals = is_yes(value),
                "FILTER_BLOCKS" => self.filter_blocks = is_yes(value),
                "RESULT_SORT_ORDER" => self.result_sort_order = value.to_string(),
                "SPLIT_SORT_ORDER" => self.split_sort_order = value.to_string(),
                _ => {}
            }
        }
    }
}
