use super::planner::{ClusterTag, PlanOutcome, PlanRequest, PlanStep, Planner};
use super::schedule::{iteration_margin, ChangePosition, TrafficBudget};
use crate::cache::CostCache;
use crate::changes::{ChangeApplicator, ChangeBatch};
use crate::cost::{CostCalculator, CostInput, CostParams};
use crate::model::{Mapping, MigrationState};
use crate::report::{replay_plan, server_name, PlanBlock, PlanReport, RunSummary, TransferLog};
use crate::split::{derive_transfers, PendingTransfer, SplitMode, SplitOrder, TransferSplitter};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Everything the schedule needs besides the engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSettings {
    /// Traffic budget of a run, in percent of the initial system size.
    pub traffic_pct: f64,
    /// Balance margin, in percent.
    pub margin: f64,
    pub iterations: usize,
    pub change_iterations: usize,
    pub runs: usize,
    pub change_pos: ChangePosition,
    pub carry_traffic: bool,
    pub converge_margin: bool,
    pub split_order: SplitOrder,
    pub load_balance: bool,
    /// Desired volume shares in percent; empty means an even split.
    pub desired_pct: Vec<f64>,
    pub output_prefix: String,
    /// Separates cache entries of runs over different change files.
    pub cache_scope: String,
    /// Also write the per-move transfer log.
    pub transfer_log: bool,
}

impl RunSettings {
    fn cost_params(&self, allowed_traffic: u64, margin: f64) -> CostParams {
        CostParams {
            allowed_traffic,
            margin,
            load_balance: self.load_balance,
            desired_pct: self.desired_pct.clone(),
            validate: true,
        }
    }

    fn report_path(&self, run: usize, suffix: &str) -> PathBuf {
        if self.runs > 1 {
            PathBuf::from(format!("{}_run{}_{}", self.output_prefix, run, suffix))
        } else {
            PathBuf::from(format!("{}_{}", self.output_prefix, suffix))
        }
    }
}

/// Drives an engine through runs of change epochs and migration iterations,
/// committing each epoch to the state and the reports.
pub(crate) struct Runner<'c> {
    planner: Box<dyn Planner>,
    settings: RunSettings,
    cache: Option<&'c dyn CostCache>,
    changes: Option<ChangeApplicator>,
    server: String,
}

/// Report writers of one run.
struct Reports {
    plan: PlanReport,
    transfers: Option<TransferLog>,
}

/// What a migration iteration decided before anything is committed.
struct Decision {
    target: Mapping,
    steps: Vec<PlanStep>,
    tag: Option<ClusterTag>,
    elapsed: Duration,
}

impl<'c> Runner<'c> {
    pub(crate) fn new(
        planner: Box<dyn Planner>,
        settings: RunSettings,
        cache: Option<&'c dyn CostCache>,
        changes: Option<ChangeApplicator>,
    ) -> Self {
        Self { planner, settings, cache, changes, server: server_name() }
    }

    fn change_iterations(&self) -> usize {
        if self.changes.is_some() {
            self.settings.change_iterations
        } else {
            0
        }
    }

    /// Run the whole schedule `runs` times over `state`.
    pub(crate) fn run(&mut self, state: &mut MigrationState) -> Result<Vec<RunSummary>> {
        let initial_size = state.total_size();
        let mut summaries = Vec::with_capacity(self.settings.runs);
        for run in 1..=self.settings.runs.max(1) {
            let span = info_span!("run", run_id = %Uuid::new_v4(), engine = self.planner.name(), run);
            let _enter = span.enter();
            summaries.push(self.run_once(state, run, initial_size)?);
        }
        Ok(summaries)
    }

    fn run_once(&mut self, state: &mut MigrationState, run: usize, initial_size: u64) -> Result<RunSummary> {
        let settings = self.settings.clone();
        let n = settings.iterations;
        let calculator = CostCalculator::new(self.cache, settings.cache_scope.clone());
        let mut reports = Reports {
            plan: PlanReport::create(&settings.report_path(run, "migration_plan.csv"), self.server.clone())?,
            transfers: if settings.transfer_log {
                Some(TransferLog::create(&settings.report_path(run, "transfers.csv"))?)
            } else {
                None
            },
        };

        let total = (initial_size as f64 * settings.traffic_pct / 100.0) as u64;
        let mut budget = TrafficBudget::new(total, n, settings.carry_traffic);
        let change_iterations = self.change_iterations();
        let mut changes_done = 0;
        info!(
            "Starting run {}/{}: {} ({} migration, {} change iterations), {} live files, budget {} bytes",
            run,
            settings.runs,
            settings.change_pos,
            n,
            change_iterations,
            state.catalog.live_count(),
            total
        );

        while changes_done < settings.change_pos.changes_before(change_iterations) {
            self.change_epoch(state, &calculator, &mut reports)?;
            changes_done += 1;
        }

        if settings.change_pos.migrates() {
            let mut pool = if settings.change_pos.plans_up_front() {
                self.plan_up_front(state, &calculator, total)?
            } else {
                Vec::new()
            };

            for iteration in 1..=n {
                let allowed = budget.next_iteration();
                let margin = iteration_margin(settings.margin, settings.converge_margin, iteration, n);
                let params = settings.cost_params(allowed, margin);
                let initial = state.mapping();

                let plan_budget = if run < settings.runs { budget.total() } else { budget.remaining() };
                let decision = self.decide(state, &calculator, &params, &mut pool, iteration, plan_budget)?;

                state.epochs.begin_migration();
                state.apply_mapping(&decision.target);
                let batch = if changes_done < change_iterations {
                    changes_done += 1;
                    state.epochs.change += 1;
                    self.next_changes(state)?
                } else {
                    None
                };

                let spent = self.commit(
                    state,
                    &calculator,
                    &mut reports,
                    &initial,
                    batch.as_ref(),
                    &params,
                    &decision,
                )?;
                budget.spend(allowed, spent);
            }

            if !pool.is_empty() {
                info!("{} planned transfers were not carried out", pool.len());
            }
        }

        if settings.change_pos.changes_after() {
            while changes_done < change_iterations {
                self.change_epoch(state, &calculator, &mut reports)?;
                changes_done += 1;
            }
        }

        let (hits, misses) = calculator.stats();
        info!("Cost cache: {} hits, {} misses", hits, misses);
        if let Some(log) = reports.transfers {
            info!("Transfer log: {} moves", log.rows());
            log.finish()?;
        }
        let path = reports.plan.path().to_path_buf();
        let summary = reports.plan.finish()?;
        info!(
            "Run {} done: traffic {:.2}%, deletion {:.2}%, report {}",
            run,
            summary.traffic_pct(),
            summary.deletion_pct(),
            path.display()
        );
        Ok(summary)
    }

    /// Plan the whole run at once and turn the plan into pending transfers.
    fn plan_up_front(
        &mut self,
        state: &MigrationState,
        calculator: &CostCalculator<'_>,
        total: u64,
    ) -> Result<Vec<PendingTransfer>> {
        let settings = &self.settings;
        let params = settings.cost_params(total, settings.margin);
        let request = PlanRequest {
            budget: total,
            margin: settings.margin,
            iteration: 1,
            num_iterations: 1,
            calculator,
            params: &params,
        };
        let outcome = self.planner.plan(state, &request)?;
        let transfers = derive_transfers(&state.mapping(), &outcome.target);
        info!("Planned {} transfers up front ({})", transfers.len(), outcome.label);
        Ok(transfers)
    }

    fn decide(
        &mut self,
        state: &MigrationState,
        calculator: &CostCalculator<'_>,
        params: &CostParams,
        pool: &mut Vec<PendingTransfer>,
        iteration: usize,
        plan_budget: u64,
    ) -> Result<Decision> {
        let started = Instant::now();
        let change_pos = self.settings.change_pos;

        let split = |pool: &mut Vec<PendingTransfer>, mode: SplitMode| {
            TransferSplitter::new(params.clone()).split(state, pool, params.allowed_traffic, mode)
        };

        match change_pos {
            ChangePosition::NaiveSplit | ChangePosition::LbSplit => {
                let mode = if change_pos == ChangePosition::NaiveSplit {
                    SplitMode::Naive
                } else {
                    SplitMode::Ranked(SplitOrder::HardLb)
                };
                let outcome = split(pool, mode);
                Ok(Decision {
                    target: outcome.target,
                    steps: Vec::new(),
                    tag: None,
                    elapsed: started.elapsed(),
                })
            }
            ChangePosition::SmartSplit => {
                let plan_params = CostParams { allowed_traffic: plan_budget, ..params.clone() };
                let outcome = self.plan(state, calculator, &plan_params, iteration, plan_budget)?;
                let mut transfers = derive_transfers(&state.mapping(), &outcome.target);
                let split_outcome = split(&mut transfers, SplitMode::Ranked(self.settings.split_order));
                info!("Left {} transfers out", transfers.len());
                Ok(Decision {
                    target: split_outcome.target,
                    steps: Vec::new(),
                    tag: outcome.tag,
                    elapsed: started.elapsed(),
                })
            }
            ChangePosition::MigrationAfterChanges
            | ChangePosition::MigrationBeforeChanges
            | ChangePosition::MigrationWithContinuousChanges
            | ChangePosition::OnlyChanges => {
                let outcome = self.plan(state, calculator, params, iteration, params.allowed_traffic)?;
                Ok(Decision {
                    target: outcome.target,
                    steps: outcome.steps,
                    tag: outcome.tag,
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    fn plan(
        &mut self,
        state: &MigrationState,
        calculator: &CostCalculator<'_>,
        params: &CostParams,
        iteration: usize,
        budget: u64,
    ) -> Result<PlanOutcome> {
        let request = PlanRequest {
            budget,
            margin: params.margin,
            iteration,
            num_iterations: self.settings.iterations,
            calculator,
            params,
        };
        self.planner.plan(state, &request)
    }

    fn next_changes(&mut self, state: &mut MigrationState) -> Result<Option<ChangeBatch>> {
        let Some(changes) = self.changes.as_mut() else {
            return Ok(None);
        };
        let batch = changes.apply_next(state)?;
        if batch.is_none() {
            warn!("Change file ran out of batches");
        }
        Ok(batch)
    }

    /// An epoch with changes only: nothing is planned and no traffic is
    /// allowed.
    fn change_epoch(
        &mut self,
        state: &mut MigrationState,
        calculator: &CostCalculator<'_>,
        reports: &mut Reports,
    ) -> Result<()> {
        let initial = state.mapping();
        state.epochs.begin_change();
        let batch = self.next_changes(state)?;
        let params = self.settings.cost_params(0, self.settings.margin);
        let decision = Decision { target: initial.clone(), steps: Vec::new(), tag: None, elapsed: Duration::ZERO };
        self.commit(state, calculator, reports, &initial, batch.as_ref(), &params, &decision)?;
        Ok(())
    }

    /// Cost the epoch that ended in the current state and report it.
    /// Returns the traffic it spent.
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        state: &MigrationState,
        calculator: &CostCalculator<'_>,
        reports: &mut Reports,
        initial: &Mapping,
        batch: Option<&ChangeBatch>,
        params: &CostParams,
        decision: &Decision,
    ) -> Result<u64> {
        let target = state.mapping();
        let input = CostInput {
            initial,
            target: &target,
            added: batch.map(|b| &b.added),
            removed: batch.map(|b| &b.removed),
        };
        let cost = calculator.evaluate(state, input, params);
        let label = state.epochs.label();
        info!(
            "Epoch {}: traffic {} of {} bytes, deletion {:.2}%, lb_score {:.4}{}",
            label,
            cost.traffic,
            params.allowed_traffic,
            cost.deletion_pct(),
            cost.lb_score,
            if cost.error_message.is_empty() { String::new() } else { format!(" ({})", cost.error_message) }
        );

        reports.plan.write_block(
            &state.catalog,
            &PlanBlock {
                label: &label,
                max_traffic: params.allowed_traffic,
                tag: decision.tag,
                margin: params.margin,
                elapsed: decision.elapsed,
                initial,
                target: &target,
                cost: &cost,
            },
        )?;
        if let Some(log) = reports.transfers.as_mut() {
            log.write_steps(&label, state, &decision.steps)?;
        }
        Ok(cost.traffic)
    }
}

/// Recost a written plan against `state` and write the figures to
/// `<prefix>_replay_migration_plan.csv`.
pub(crate) fn replay(
    state: &MigrationState,
    plan_path: &Path,
    settings: &RunSettings,
    cache: Option<&dyn CostCache>,
) -> Result<RunSummary> {
    let span = info_span!("run", run_id = %Uuid::new_v4(), engine = "replay");
    let _enter = span.enter();

    let calculator = CostCalculator::new(cache, settings.cache_scope.clone());
    let params = settings.cost_params(0, settings.margin);
    let blocks = replay_plan(plan_path, state, &calculator, &params)?;

    let path = PathBuf::from(format!("{}_replay_migration_plan.csv", settings.output_prefix));
    let mut report = PlanReport::create(&path, server_name())?;
    for (block, cost) in &blocks {
        if block.skipped > 0 {
            warn!("Plan block {} skipped {} unknown files", block.label, block.skipped);
        }
        report.write_block(
            &state.catalog,
            &PlanBlock {
                label: &block.label,
                max_traffic: block.max_traffic,
                tag: None,
                margin: settings.margin,
                elapsed: Duration::ZERO,
                initial: &block.initial,
                target: &block.target,
                cost,
            },
        )?;
    }
    let summary = report.finish()?;
    info!(
        "Replayed {} blocks: traffic {:.2}%, deletion {:.2}%, report {}",
        blocks.len(),
        summary.traffic_pct(),
        summary.deletion_pct(),
        path.display()
    );
    Ok(summary)
}
