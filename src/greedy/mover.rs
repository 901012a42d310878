use super::history::LoopHistory;
use super::search::{is_legal_state, next_transfer, Phase, SearchLimits};
use crate::model::{MigrationState, Transfer};
use crate::runner::{PlanOutcome, PlanRequest, PlanStep, Planner};
use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SUB_STEPS: u32 = 5;
const MIN_MARGIN_EXTENSION: f64 = 0.05;

/// Tuning knobs of the greedy engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GreedyOptions {
    /// Multiplier on the iteration budget; the engine rarely spends all of it.
    pub traffic_handicap: f64,
    /// Wall-clock budget of one iteration's reduction phase.
    pub time_limit: Duration,
}

/// Iterative best-single-file mover.
///
/// Each iteration runs five sub-steps under a margin that tightens from
/// 1.5x to 1x of the iteration margin. Every sub-step first balances
/// (largest volume toward smallest) and then reduces capacity across all
/// volume pairs without leaving the legal state. Traffic is released a
/// fifth of the remainder at a time, the last sub-step gets all of it.
#[derive(Debug, Clone)]
pub(crate) struct GreedyMover {
    options: GreedyOptions,
}

/// Margin bookkeeping for one call to [`GreedyMover::plan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MarginSchedule {
    /// Iteration margin, as a fraction.
    pub iteration: f64,
    pub skip_balancing: bool,
}

impl MarginSchedule {
    /// Iterations slide from `margin + ext` down to `margin`, where
    /// `ext = max(0.05, margin / 2)`. A margin of 100% or more makes every
    /// state legal, so balancing is skipped altogether.
    pub(crate) fn for_iteration(margin: f64, iteration: usize, num_iterations: usize) -> Self {
        if margin >= 1.0 {
            return Self { iteration: margin, skip_balancing: true };
        }
        let ext = MIN_MARGIN_EXTENSION.max(0.5 * margin);
        let n = num_iterations.max(1) as f64;
        let done = iteration.clamp(1, num_iterations.max(1)) as f64;
        Self { iteration: margin + ext - done * ext / n, skip_balancing: false }
    }

    /// Margin of sub-step `k`: `iteration × (1.5 − 0.125k)`.
    pub(crate) fn sub_step(&self, k: u32) -> f64 {
        self.iteration * (1.5 - 0.125 * f64::from(k))
    }
}

/// Traffic ceiling of sub-step `k`: the previous spend plus a fifth of what
/// is left, or the whole budget on the last sub-step.
pub(crate) fn sub_step_cap(used: u64, budget: u64, k: u32) -> u64 {
    if k + 1 >= SUB_STEPS {
        return budget;
    }
    used + budget.saturating_sub(used) / u64::from(SUB_STEPS)
}

struct Run {
    state: MigrationState,
    desired: Vec<f64>,
    history: LoopHistory,
    used: u64,
    steps: Vec<PlanStep>,
    started: Instant,
    time_limit: Duration,
    budget: u64,
}

impl Run {
    fn limits(&self, cap: u64, margin: f64) -> SearchLimits<'_> {
        SearchLimits { used_traffic: self.used, traffic_cap: cap, margin, desired: &self.desired }
    }

    fn is_legal(&self, margin: f64) -> bool {
        is_legal_state(self.state.volume_sizes(), &self.desired, margin)
    }

    fn apply(&mut self, transfer: Transfer, phase: Phase, margin: f64) {
        self.state.apply_transfer(&transfer);
        self.history.remember(transfer.file_sn);
        self.used += transfer.traffic;
        self.steps.push(PlanStep {
            transfer,
            phase,
            margin,
            total_traffic: self.used,
            elapsed: self.started.elapsed(),
        });
    }

    fn balance(&mut self, cap: u64, margin: f64) {
        while !self.is_legal(margin) {
            let Some(transfer) =
                next_transfer(&self.state, &self.history, &self.limits(cap, margin), Phase::Balance)
            else {
                break;
            };
            debug!(
                "balance: file {} from {} to {} (traffic {})",
                transfer.file_sn, transfer.source, transfer.target, transfer.traffic
            );
            self.apply(transfer, Phase::Balance, margin);
        }

        if self.is_legal(margin) {
            info!("Balanced to margin {:.4}", margin);
        } else {
            info!("Cannot balance to margin {:.4}", margin);
        }
    }

    /// Once the time limit has passed, the step found is still applied and
    /// recorded, then the phase ends. Later sub-steps keep balancing.
    fn reduce(&mut self, cap: u64, margin: f64) {
        while let Some(transfer) =
            next_transfer(&self.state, &self.history, &self.limits(cap, margin), Phase::Reduce)
        {
            debug!(
                "optimize: file {} from {} to {} (deleted {}, replicated {}, traffic {})",
                transfer.file_sn,
                transfer.source,
                transfer.target,
                transfer.deleted,
                transfer.replicated,
                transfer.traffic
            );
            self.apply(transfer, Phase::Reduce, margin);
            if self.started.elapsed() >= self.time_limit {
                info!("Time limit of {:?} reached, stopping reduction at margin {:.4}", self.time_limit, margin);
                break;
            }
        }

        if self.is_legal(margin) {
            debug!("Optimized under margin {:.4}", margin);
        } else {
            debug!("Unable to optimize under margin {:.4}", margin);
        }
    }
}

impl GreedyMover {
    pub(crate) fn new(options: GreedyOptions) -> Self {
        Self { options }
    }

    /// Budget the engine actually plans with.
    pub(crate) fn handicapped(&self, budget: u64) -> u64 {
        (budget as f64 * self.options.traffic_handicap) as u64
    }
}

impl Planner for GreedyMover {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn plan(&mut self, state: &MigrationState, request: &PlanRequest<'_>) -> Result<PlanOutcome> {
        let started = Instant::now();
        let schedule = MarginSchedule::for_iteration(
            request.margin / 100.0,
            request.iteration,
            request.num_iterations,
        );
        let budget = self.handicapped(request.budget);

        info!(
            "Greedy planning: iteration={}/{}, margin={:.4}, budget={} bytes (handicapped {})",
            request.iteration, request.num_iterations, schedule.iteration, request.budget, budget
        );

        let mut run = Run {
            state: state.clone(),
            desired: state.desired(),
            history: LoopHistory::new(),
            used: 0,
            steps: Vec::new(),
            started,
            time_limit: self.options.time_limit,
            budget,
        };

        if schedule.skip_balancing {
            run.reduce(run.budget, schedule.iteration);
        } else {
            for k in 0..SUB_STEPS {
                let margin = schedule.sub_step(k);
                let cap = sub_step_cap(run.used, run.budget, k);
                run.balance(cap, margin);
                run.reduce(cap, margin);
            }
        }

        info!(
            "Plan generated: {} moves, {} bytes of traffic in {:.1}s",
            run.steps.len(),
            run.used,
            started.elapsed().as_secs_f64()
        );

        Ok(PlanOutcome {
            target: run.state.mapping(),
            steps: run.steps,
            tag: None,
            label: format!("greedy margin={:.4}", schedule.iteration),
            elapsed: started.elapsed(),
        })
    }
}
