use crate::cost::CostResult;
use std::cmp::Ordering;
use std::fmt;

/// How the ranked split chooses among the pending transfers.
///
/// The `hard` orders rank transfers whose end state is load balanced ahead
/// of the rest; the `soft` ones only need a transfer to fit the traffic
/// budget. Neither rules a fitting transfer out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitOrder {
    HardDeletion,
    SoftDeletion,
    HardLb,
    SoftLb,
}

impl SplitOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardDeletion => "hard_deletion",
            Self::SoftDeletion => "soft_deletion",
            Self::HardLb => "hard_lb",
            Self::SoftLb => "soft_lb",
        }
    }

    pub const fn is_hard(self) -> bool {
        matches!(self, Self::HardDeletion | Self::HardLb)
    }

    /// `Less` when `a` should be taken before `b`.
    pub(crate) fn compare(self, a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
        let validity = if self.is_hard() { b.lb_valid.cmp(&a.lb_valid) } else { Ordering::Equal };
        validity.then_with(|| match self {
            Self::HardDeletion | Self::SoftDeletion => by_deletion(a, b),
            Self::HardLb | Self::SoftLb => by_balance(a, b),
        })
    }
}

impl fmt::Display for SplitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SplitOrder {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "hard_deletion" => Ok(Self::HardDeletion),
            "soft_deletion" => Ok(Self::SoftDeletion),
            "hard_lb" => Ok(Self::HardLb),
            "soft_lb" => Ok(Self::SoftLb),
            other => Err(format!("unknown split sort order: {other}")),
        }
    }
}

/// Figures the ranked split compares candidates by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RankedCandidate {
    /// Net bytes reclaimed once the transfer is applied.
    pub deletion: i64,
    pub lb_valid: bool,
    pub lb_score: f64,
    /// Bytes the transfer itself sends.
    pub traffic: u64,
}

impl RankedCandidate {
    pub(crate) fn new(end: &CostResult, middle: &CostResult) -> Self {
        Self {
            deletion: end.deletion_bytes(),
            lb_valid: end.lb_valid,
            lb_score: end.lb_score,
            traffic: middle.traffic,
        }
    }
}

fn by_deletion(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.deletion
        .cmp(&a.deletion)
        .then(b.lb_valid.cmp(&a.lb_valid))
        .then(b.lb_score.total_cmp(&a.lb_score))
        .then(a.traffic.cmp(&b.traffic))
}

fn by_balance(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.lb_score
        .total_cmp(&a.lb_score)
        .then(b.deletion.cmp(&a.deletion))
        .then(b.lb_valid.cmp(&a.lb_valid))
        .then(a.traffic.cmp(&b.traffic))
}
