use super::ordering::{RankedCandidate, SplitOrder};
use super::transfers::PendingTransfer;
use crate::cost::{CostCalculator, CostInput, CostParams, CostResult};
use crate::model::{BlockId, Mapping, MigrationState};
use std::collections::HashSet;
use tracing::{debug, info};

/// Which greedy the splitter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitMode {
    /// Best reclaim ratio first, balance ignored.
    Naive,
    /// Rank by end-state figures under the given order.
    Ranked(SplitOrder),
}

impl SplitMode {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Ranked(order) => order.as_str(),
        }
    }
}

/// What one split pass took from the pool.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SplitOutcome {
    /// Mapping with the accepted transfers applied.
    pub target: Mapping,
    pub accepted: Vec<PendingTransfer>,
    /// Traffic charged against the budget.
    pub spent: u64,
}

/// Allocates a committed plan's transfers to traffic-bounded passes.
///
/// Every candidate is re-costed against the mapping produced by the
/// transfers accepted so far in the pass.
pub(crate) struct TransferSplitter {
    calculator: CostCalculator<'static>,
    params: CostParams,
}

fn with_move(mapping: &Mapping, transfer: &PendingTransfer) -> Mapping {
    let mut moved = mapping.clone();
    moved[transfer.source].remove(&transfer.file);
    moved[transfer.target].insert(transfer.file);
    moved
}

fn with_copy(mapping: &Mapping, transfer: &PendingTransfer) -> Mapping {
    let mut grown = mapping.clone();
    grown[transfer.target].insert(transfer.file);
    grown
}

impl TransferSplitter {
    /// `params` supplies margin and balance settings; the traffic bound is
    /// replaced by the remaining budget for every evaluation.
    pub(crate) fn new(params: CostParams) -> Self {
        Self { calculator: CostCalculator::new(None, "split"), params }
    }

    fn evaluate(&self, state: &MigrationState, from: &Mapping, to: &Mapping, remaining: u64) -> CostResult {
        let params = CostParams { allowed_traffic: remaining, validate: true, ..self.params.clone() };
        self.calculator.evaluate(state, CostInput::plan(from, to), &params)
    }

    /// Take transfers out of `pool` until `budget` is spent or nothing fits.
    pub(crate) fn split(
        &self,
        state: &MigrationState,
        pool: &mut Vec<PendingTransfer>,
        budget: u64,
        mode: SplitMode,
    ) -> SplitOutcome {
        let mut iter_state = state.mapping();
        let mut without_removes = iter_state.clone();
        let mut remaining = budget;
        let mut accepted = Vec::new();

        pool.retain(|t| {
            let resident = iter_state[t.source].contains(&t.file);
            if !resident {
                debug!(
                    "Dropping transfer of file {} from {} to {}: file is no longer there",
                    state.catalog.get(t.file).sn,
                    t.source,
                    t.target
                );
            }
            resident
        });

        while remaining > 0 && !pool.is_empty() {
            let choice = match mode {
                SplitMode::Naive => self.naive_pick(state, pool, &iter_state, remaining),
                SplitMode::Ranked(order) => {
                    self.ranked_pick(state, pool, &iter_state, &without_removes, remaining, order)
                }
            };
            let Some((index, charged)) = choice else {
                break;
            };

            let transfer = pool.remove(index);
            iter_state = with_move(&iter_state, &transfer);
            if matches!(mode, SplitMode::Ranked(_)) {
                without_removes[transfer.target].insert(transfer.file);
            }
            remaining = remaining.saturating_sub(charged);
            debug!(
                "Split accepted file {} from {} to {} ({} bytes, {} left)",
                state.catalog.get(transfer.file).sn,
                transfer.source,
                transfer.target,
                charged,
                remaining
            );
            accepted.push(transfer);
        }

        let spent = budget - remaining;
        info!(
            "Split ({}) accepted {} transfers using {} of {} bytes, {} pending",
            mode.label(),
            accepted.len(),
            spent,
            budget,
            pool.len()
        );
        SplitOutcome { target: iter_state, accepted, spent }
    }

    /// Lowest `replicated / (deleted + replicated)` among the transfers that
    /// fit. Returns the pool index and the traffic to charge.
    fn naive_pick(
        &self,
        state: &MigrationState,
        pool: &[PendingTransfer],
        iter_state: &Mapping,
        remaining: u64,
    ) -> Option<(usize, u64)> {
        let mut best: Option<(usize, u64, f64)> = None;
        for (i, transfer) in pool.iter().enumerate() {
            let moved = with_move(iter_state, transfer);
            let end = self.evaluate(state, iter_state, &moved, remaining);
            if !end.traffic_valid {
                continue;
            }

            let replicated = replicated_bytes(state, iter_state, transfer) as i64;
            let ratio = replicated as f64 / (end.deletion_bytes() + replicated).max(1) as f64;
            if best.map_or(true, |(_, _, r)| ratio < r) {
                best = Some((i, end.traffic, ratio));
            }
        }
        best.map(|(i, traffic, _)| (i, traffic))
    }

    fn ranked_pick(
        &self,
        state: &MigrationState,
        pool: &[PendingTransfer],
        iter_state: &Mapping,
        without_removes: &Mapping,
        remaining: u64,
        order: SplitOrder,
    ) -> Option<(usize, u64)> {
        let mut best: Option<(usize, RankedCandidate)> = None;
        for (i, transfer) in pool.iter().enumerate() {
            let grown = with_copy(without_removes, transfer);
            let middle = self.evaluate(state, without_removes, &grown, remaining);
            if !middle.traffic_valid {
                continue;
            }
            let moved = with_move(iter_state, transfer);
            let end = self.evaluate(state, iter_state, &moved, remaining);

            let candidate = RankedCandidate::new(&end, &middle);
            if best.map_or(true, |(_, b)| order.compare(&candidate, &b).is_lt()) {
                best = Some((i, candidate));
            }
        }
        best.map(|(i, c)| (i, c.traffic))
    }
}

/// Bytes of the file that the source keeps through its other files and the
/// target does not have yet.
fn replicated_bytes(state: &MigrationState, mapping: &Mapping, transfer: &PendingTransfer) -> u64 {
    let blocks_without = |volume: usize, skip: Option<usize>| -> HashSet<BlockId> {
        mapping[volume]
            .iter()
            .filter(|&&f| Some(f) != skip)
            .flat_map(|&f| state.catalog.get(f).blocks.iter().copied())
            .collect()
    };
    let source_rest = blocks_without(transfer.source, Some(transfer.file));
    let target = blocks_without(transfer.target, None);
    state.blocks.total(
        state.catalog.get(transfer.file).blocks.iter().filter(|b| source_rest.contains(b) && !target.contains(b)),
    )
}
