use crate::cost::CostResult;
use anyhow::{anyhow, ensure, Result};
use std::cmp::Ordering;
use std::fmt;

/// One key of the result comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKey {
    TrafficValid,
    LbValid,
    Deletion,
    LbScore,
    Traffic,
}

impl ResultKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrafficValid => "traffic_valid",
            Self::LbValid => "lb_valid",
            Self::Deletion => "deletion",
            Self::LbScore => "lb_score",
            Self::Traffic => "traffic",
        }
    }

    /// `Greater` when `a` is the better result under this key.
    fn compare(self, a: &CostResult, b: &CostResult) -> Ordering {
        match self {
            Self::TrafficValid => a.traffic_valid.cmp(&b.traffic_valid),
            Self::LbValid => a.lb_valid.cmp(&b.lb_valid),
            Self::Deletion => a.deletion_pct().total_cmp(&b.deletion_pct()),
            Self::LbScore => a.lb_score.total_cmp(&b.lb_score),
            Self::Traffic => b.traffic_pct().total_cmp(&a.traffic_pct()),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ResultKey {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "traffic_valid" => Ok(Self::TrafficValid),
            "lb_valid" => Ok(Self::LbValid),
            "deletion" => Ok(Self::Deletion),
            "lb_score" => Ok(Self::LbScore),
            "traffic" => Ok(Self::Traffic),
            other => Err(format!("unknown result sort key: {other}")),
        }
    }
}

/// Parse a whitespace or comma separated list of keys. Keys may not repeat.
pub(crate) fn parse_sort_order(text: &str) -> Result<Vec<ResultKey>> {
    let mut keys = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        let key = ResultKey::try_from(token).map_err(|e| anyhow!(e))?;
        ensure!(!keys.contains(&key), "result sort key {} given twice", key);
        keys.push(key);
    }
    ensure!(!keys.is_empty(), "result sort order is empty");
    Ok(keys)
}

/// Lexicographic comparison under `order`; `Greater` means `a` is better.
pub(crate) fn compare_results(order: &[ResultKey], a: &CostResult, b: &CostResult) -> Ordering {
    order.iter().map(|key| key.compare(a, b)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
}

/// Index of the best result; the earliest wins ties.
pub(crate) fn best_result<'a>(order: &[ResultKey], results: impl IntoIterator<Item = &'a CostResult>) -> Option<usize> {
    let mut best: Option<(usize, &CostResult)> = None;
    for (i, result) in results.into_iter().enumerate() {
        match best {
            Some((_, current)) if compare_results(order, result, current).is_le() => {}
            _ => best = Some((i, result)),
        }
    }
    best.map(|(i, _)| i)
}
