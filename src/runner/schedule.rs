use std::fmt;

/// Where change epochs go relative to the migration iterations, and how
/// the migration is cut into iterations.
///
/// Every migration iteration also absorbs one change batch while change
/// iterations are left, whatever the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangePosition {
    /// All but the last change epoch run before the migration.
    MigrationAfterChanges,
    /// Change epochs left after the migration run at the end.
    MigrationBeforeChanges,
    MigrationWithContinuousChanges,
    /// Plan once, then hand out transfers by reclaim ratio.
    NaiveSplit,
    /// Plan once, then hand out transfers that keep the system balanced.
    LbSplit,
    /// Plan every iteration with the whole budget, then split.
    SmartSplit,
    /// Change epochs only, nothing migrates.
    OnlyChanges,
}

impl ChangePosition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MigrationAfterChanges => "migration_after_changes",
            Self::MigrationBeforeChanges => "migration_before_changes",
            Self::MigrationWithContinuousChanges => "migration_with_continuous_changes",
            Self::NaiveSplit => "naive_split",
            Self::LbSplit => "lb_split",
            Self::SmartSplit => "smart_split",
            Self::OnlyChanges => "only_changes",
        }
    }

    /// Change epochs to run before the first migration iteration.
    pub(crate) fn changes_before(self, change_iterations: usize) -> usize {
        match self {
            Self::MigrationAfterChanges => change_iterations.saturating_sub(1),
            Self::OnlyChanges => change_iterations,
            Self::MigrationBeforeChanges
            | Self::MigrationWithContinuousChanges
            | Self::NaiveSplit
            | Self::LbSplit
            | Self::SmartSplit => 0,
        }
    }

    /// Whether change epochs left over after the migration still run.
    pub(crate) const fn changes_after(self) -> bool {
        matches!(self, Self::MigrationBeforeChanges)
    }

    pub(crate) const fn migrates(self) -> bool {
        !matches!(self, Self::OnlyChanges)
    }

    /// The whole run is planned once and handed out over the iterations.
    pub(crate) const fn plans_up_front(self) -> bool {
        matches!(self, Self::NaiveSplit | Self::LbSplit)
    }
}

impl fmt::Display for ChangePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ChangePosition {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "migration_after_changes" => Ok(Self::MigrationAfterChanges),
            "migration_before_changes" => Ok(Self::MigrationBeforeChanges),
            "migration_with_continuous_changes" => Ok(Self::MigrationWithContinuousChanges),
            "naive_split" => Ok(Self::NaiveSplit),
            "lb_split" => Ok(Self::LbSplit),
            "smart_split" => Ok(Self::SmartSplit),
            "only_changes" => Ok(Self::OnlyChanges),
            other => Err(format!("invalid change position: {other}")),
        }
    }
}

/// Traffic bookkeeping of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrafficBudget {
    total: u64,
    per_iteration: u64,
    leftovers: u64,
    remaining: u64,
    carry: bool,
}

impl TrafficBudget {
    pub(crate) fn new(total: u64, iterations: usize, carry: bool) -> Self {
        let n = iterations.max(1) as u64;
        Self {
            total,
            per_iteration: total / n,
            leftovers: if carry { total % n } else { 0 },
            remaining: total,
            carry,
        }
    }

    pub(crate) const fn total(&self) -> u64 {
        self.total
    }

    /// Traffic not spent by any iteration so far.
    pub(crate) const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Budget of the next iteration.
    pub(crate) const fn next_iteration(&self) -> u64 {
        self.per_iteration + self.leftovers
    }

    /// Book what an iteration with budget `allowed` actually spent.
    pub(crate) fn spend(&mut self, allowed: u64, spent: u64) {
        self.leftovers = if self.carry { allowed.saturating_sub(spent) } else { 0 };
        self.remaining = self.remaining.saturating_sub(spent);
    }
}

/// Margin of iteration `iteration` (1-based) of `iterations`, in percent.
/// Converging margins start at 1.5x and end at the configured value.
pub(crate) fn iteration_margin(margin: f64, converge: bool, iteration: usize, iterations: usize) -> f64 {
    if !converge || iterations == 0 {
        return margin;
    }
    margin * (1.5 - 0.5 * iteration as f64 / iterations as f64)
}
