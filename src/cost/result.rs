use serde::{Deserialize, Serialize};

/// Raw per-volume cost figures, in bytes. This is also what the cost cache
/// stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VolumeCost {
    pub init_size: u64,
    pub received: u64,
    pub deleted: u64,
    /// `only_migration + (aborted + overlap) / 2`, rounded down once.
    pub traffic: u64,
    pub overlap_traffic: u64,
    pub block_reuse: u64,
    pub aborted_traffic: u64,
}

impl VolumeCost {
    pub(crate) fn final_size(&self) -> u64 {
        (self.init_size + self.received).saturating_sub(self.deleted)
    }
}

/// Everything known about the consequences of one proposed final mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CostResult {
    pub names: Vec<String>,
    pub volumes: Vec<VolumeCost>,
    pub init_system_size: u64,
    pub received: u64,
    pub deleted: u64,
    pub traffic: u64,
    pub overlap_traffic: u64,
    pub block_reuse: u64,
    pub aborted_traffic: u64,
    pub traffic_valid: bool,
    pub lb_valid: bool,
    pub error_message: String,
    /// Smallest over largest normalized final volume size; 1.0 is perfect.
    pub lb_score: f64,
}

/// Validation parameters applied on top of the raw figures.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CostParams {
    pub allowed_traffic: u64,
    /// Per-volume margin, in percent.
    pub margin: f64,
    pub load_balance: bool,
    /// Desired share of each volume, in percent. Empty means an even split.
    pub desired_pct: Vec<f64>,
    /// When false both validity flags are reported as true.
    pub validate: bool,
}

impl CostResult {
    /// Sum the per-volume figures and apply the validity checks.
    pub(crate) fn from_volumes(names: Vec<String>, volumes: Vec<VolumeCost>, params: &CostParams) -> Self {
        let sum = |f: fn(&VolumeCost) -> u64| volumes.iter().map(f).sum::<u64>();
        let init_system_size = sum(|v| v.init_size);
        let received = sum(|v| v.received);
        let deleted = sum(|v| v.deleted);
        let traffic = sum(|v| v.traffic);
        let overlap_traffic = sum(|v| v.overlap_traffic);
        let block_reuse = sum(|v| v.block_reuse);
        let aborted_traffic = sum(|v| v.aborted_traffic);

        let final_system_size = (init_system_size + received).saturating_sub(deleted);
        let (traffic_valid, lb_valid, error_message) = if params.validate {
            let traffic_valid = traffic <= params.allowed_traffic;
            let lb_check = if params.load_balance {
                check_margins(&names, &volumes, final_system_size, params)
            } else {
                Ok(())
            };
            match lb_check {
                Ok(()) => (traffic_valid, true, String::new()),
                Err(message) => (traffic_valid, false, message),
            }
        } else {
            (true, true, String::new())
        };

        let lb_score = lb_score(&volumes, &params.desired_pct);

        Self {
            names,
            volumes,
            init_system_size,
            received,
            deleted,
            traffic,
            overlap_traffic,
            block_reuse,
            aborted_traffic,
            traffic_valid,
            lb_valid,
            error_message,
            lb_score,
        }
    }

    pub(crate) fn final_system_size(&self) -> u64 {
        (self.init_system_size + self.received).saturating_sub(self.deleted)
    }

    /// Net bytes reclaimed: deleted minus received. Negative when the
    /// system grew.
    pub(crate) fn deletion_bytes(&self) -> i64 {
        self.deleted as i64 - self.received as i64
    }

    pub(crate) fn traffic_pct(&self) -> f64 {
        percent_of(self.traffic as f64, self.init_system_size)
    }

    pub(crate) fn deletion_pct(&self) -> f64 {
        percent_of(self.deletion_bytes() as f64, self.init_system_size)
    }

    pub(crate) fn init_pct(&self, volume: usize) -> f64 {
        percent_of(self.volumes[volume].init_size as f64, self.init_system_size)
    }

    pub(crate) fn final_pct(&self, volume: usize) -> f64 {
        percent_of(self.volumes[volume].final_size() as f64, self.final_system_size())
    }
}

fn percent_of(value: f64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    value * 100.0 / total as f64
}

fn desired_of(desired_pct: &[f64], volume: usize, num_volumes: usize) -> f64 {
    desired_pct.get(volume).copied().unwrap_or(100.0 / num_volumes as f64)
}

/// Every volume's final share must lie within `desired ± margin`. The first
/// violation is reported.
fn check_margins(
    names: &[String],
    volumes: &[VolumeCost],
    final_system_size: u64,
    params: &CostParams,
) -> Result<(), String> {
    for (v, cost) in volumes.iter().enumerate() {
        let pct = percent_of(cost.final_size() as f64, final_system_size);
        let desired = desired_of(&params.desired_pct, v, volumes.len());
        if pct > desired + params.margin || pct < desired - params.margin {
            return Err(format!(
                "volume={} size={:.6}% is not between the corresponding lb_size margin",
                names[v], pct
            ));
        }
    }
    Ok(())
}

/// Final sizes normalized to an even split, then min over max. Volumes
/// with a zero desired share do not take part.
fn lb_score(volumes: &[VolumeCost], desired_pct: &[f64]) -> f64 {
    let n = volumes.len();
    let normalized: Vec<f64> = volumes
        .iter()
        .enumerate()
        .filter_map(|(v, cost)| {
            let size = cost.final_size() as f64;
            if desired_pct.is_empty() {
                return Some(size);
            }
            let desired = desired_of(desired_pct, v, n);
            (desired > 0.0).then(|| (100.0 / n as f64) / desired * size)
        })
        .collect();

    let min = normalized.iter().copied().fold(f64::INFINITY, f64::min);
    let max = normalized.iter().copied().fold(0.0_f64, f64::max);
    if normalized.is_empty() || max <= 0.0 {
        return 1.0;
    }
    min / max
}
