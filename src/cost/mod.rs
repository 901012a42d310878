mod calculator;
mod key;
mod result;

pub(crate) use calculator::{CostCalculator, CostInput};
pub(crate) use result::{CostParams, CostResult, VolumeCost};

#[cfg(test)]
pub(crate) use calculator::compute_volume_costs;
#[cfg(test)]
pub(crate) use key::cost_cache_key;
