use crate::cost::{CostCalculator, CostParams};
use crate::greedy::Phase;
use crate::model::{Mapping, MigrationState, Transfer};
use anyhow::Result;
use std::time::Duration;

/// What one migration iteration asks of an engine.
pub(crate) struct PlanRequest<'a> {
    /// Traffic the iteration may spend, in bytes.
    pub budget: u64,
    /// Per-volume balance margin, in percent.
    pub margin: f64,
    /// 1-based migration iteration within the run.
    pub iteration: usize,
    pub num_iterations: usize,
    pub calculator: &'a CostCalculator<'a>,
    /// Parameters candidate mappings are scored with.
    pub params: &'a CostParams,
}

/// One move an engine applied while planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlanStep {
    pub transfer: Transfer,
    pub phase: Phase,
    /// Margin in force when the move was made, as a fraction.
    pub margin: f64,
    /// Traffic spent by the plan so far, this move included.
    pub total_traffic: u64,
    pub elapsed: Duration,
}

/// Parameters that identify a clustering result in the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClusterTag {
    pub wt: f64,
    pub gap: f64,
    pub seed: u64,
    pub eps: f64,
    pub attempts: usize,
}

/// An engine's answer: the mapping it wants the system to end in.
#[derive(Debug, Clone)]
pub(crate) struct PlanOutcome {
    pub target: Mapping,
    /// Individual moves, for engines that plan move by move.
    pub steps: Vec<PlanStep>,
    pub tag: Option<ClusterTag>,
    pub label: String,
    pub elapsed: Duration,
}

/// A migration planning engine.
pub(crate) trait Planner {
    fn name(&self) -> &'static str;

    /// Propose a final mapping for `state`. The state itself is left as is;
    /// the caller decides whether to commit the proposal.
    fn plan(&mut self, state: &MigrationState, request: &PlanRequest<'_>) -> Result<PlanOutcome>;
}
