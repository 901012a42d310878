use super::settings::PlannerConfig;
use crate::clustering::parse_sort_order;
use crate::split::SplitOrder;
use anyhow::{ensure, Result};

impl PlannerConfig {
    /// Validate configuration values are sane.
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!((0.0..=100.0).contains(&self.margin), "margin must be between 0 and 100");
        ensure!(self.eps > 0.0, "eps must be > 0");
        ensure!(self.max_attempts >= 1, "max_attempts must be >= 1");
        ensure!(self.max_offers >= 1, "max_offers must be >= 1");
        ensure!(self.traffic_handicap >= 1.0, "traffic_handicap must be >= 1");
        ensure!(self.lock_attempts >= 1, "lock_attempts must be >= 1");
        ensure!(!self.output_prefix.is_empty(), "output_prefix must not be empty");
        parse_sort_order(&self.result_sort_order)?;
        SplitOrder::try_from(self.split_sort_order.as_str()).map_err(anyhow::Error::msg)?;
        Ok(())
    }
}
