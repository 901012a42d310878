use super::history::LoopHistory;
use crate::model::{FileIdx, MigrationState, Transfer, VolumeId};

/// Which of the two greedy phases is searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Move toward a legal state; legality is not required per move.
    Balance,
    /// Reclaim space without leaving the legal state.
    Reduce,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Reduce => "optimize",
        }
    }
}

/// What the search may spend and must respect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchLimits<'a> {
    pub used_traffic: u64,
    pub traffic_cap: u64,
    /// Allowed deviation from the desired share, as a fraction.
    pub margin: f64,
    pub desired: &'a [f64],
}

/// Every volume's share of the total within `desired ± margin`. An empty
/// system is legal.
pub(crate) fn is_legal_state(sizes: &[u64], desired: &[f64], margin: f64) -> bool {
    let total: u64 = sizes.iter().sum();
    if total == 0 {
        return true;
    }
    sizes.iter().zip(desired).all(|(&size, &want)| {
        let load = size as f64 / total as f64;
        load <= want + margin && load >= want - margin
    })
}

/// Volume sizes after `transfer`: the source loses what it deletes plus
/// what moves without being replicated, the target gains what moves.
pub(crate) fn simulate(sizes: &[u64], transfer: &Transfer) -> Vec<u64> {
    let mut after = sizes.to_vec();
    let shed = (transfer.deleted + transfer.moved).saturating_sub(transfer.replicated);
    after[transfer.source] = after[transfer.source].saturating_sub(shed);
    after[transfer.target] += transfer.moved;
    after
}

/// Cost of moving one file from `source` to `target` in the current state.
pub(crate) fn score_file(
    state: &MigrationState,
    file: FileIdx,
    source: VolumeId,
    target: VolumeId,
) -> Transfer {
    let record = state.catalog.get(file);
    let mut transfer = Transfer {
        source,
        target,
        file,
        file_sn: record.sn,
        replicated: 0,
        deleted: 0,
        moved: 0,
        traffic: 0,
    };

    for &block in &record.blocks {
        let size = state.blocks.size(block);
        let in_source = state.refs.count(block, source);
        let in_target = state.refs.count(block, target);
        if in_source == 1 {
            if in_target > 0 {
                transfer.deleted += size;
            } else {
                transfer.moved += size;
                transfer.traffic += size;
            }
        } else if in_target == 0 {
            transfer.replicated += size;
            transfer.moved += size;
            transfer.traffic += size;
        }
    }
    transfer
}

/// Best single-file move from `source` to `target`: lowest reclaim ratio,
/// first found on ties.
pub(crate) fn best_transfer(
    state: &MigrationState,
    history: &LoopHistory,
    limits: &SearchLimits<'_>,
    source: VolumeId,
    target: VolumeId,
    phase: Phase,
) -> Option<Transfer> {
    if source == target {
        return None;
    }

    let sizes = state.volume_sizes();
    let mut best: Option<Transfer> = None;

    for &file in state.catalog.files_in(source) {
        let sn = state.catalog.get(file).sn;
        if history.is_most_recent(sn) {
            continue;
        }

        let candidate = score_file(state, file, source, target);
        if history.contains(sn) && candidate.traffic == 0 && candidate.deleted <= candidate.replicated {
            continue;
        }

        let idle = match phase {
            Phase::Reduce => candidate.deleted == 0,
            Phase::Balance => candidate.deleted == 0 && candidate.moved == 0 && candidate.replicated == 0,
        };
        if idle {
            continue;
        }

        if limits.used_traffic + candidate.traffic > limits.traffic_cap {
            continue;
        }
        if best.is_some_and(|b| candidate.reclaim_ratio() >= b.reclaim_ratio()) {
            continue;
        }
        if phase == Phase::Reduce
            && !is_legal_state(&simulate(sizes, &candidate), limits.desired, limits.margin)
        {
            continue;
        }
        best = Some(candidate);
    }
    best
}

/// One greedy step: the move the given phase would make next, if any.
pub(crate) fn next_transfer(
    state: &MigrationState,
    history: &LoopHistory,
    limits: &SearchLimits<'_>,
    phase: Phase,
) -> Option<Transfer> {
    match phase {
        Phase::Reduce => {
            let n = state.num_volumes();
            let mut best: Option<Transfer> = None;
            for source in 0..n {
                for target in 0..n {
                    let Some(candidate) = best_transfer(state, history, limits, source, target, phase)
                    else {
                        continue;
                    };
                    if best.is_none_or(|b| candidate.reclaim_ratio() < b.reclaim_ratio()) {
                        best = Some(candidate);
                    }
                }
            }
            best
        }
        Phase::Balance => balance_transfer(state, history, limits),
    }
}

/// Try the largest volume toward the smallest first, then walk the targets
/// upward and the sources downward until some pair yields a move.
fn balance_transfer(
    state: &MigrationState,
    history: &LoopHistory,
    limits: &SearchLimits<'_>,
) -> Option<Transfer> {
    let sizes = state.volume_sizes();
    let mut order: Vec<VolumeId> = (0..sizes.len()).collect();
    order.sort_by_key(|&v| (sizes[v], v));

    for big in (1..order.len()).rev() {
        for small in 0..order.len() {
            if small == big {
                continue;
            }
            let found =
                best_transfer(state, history, limits, order[big], order[small], Phase::Balance);
            if found.is_some() {
                return found;
            }
        }
    }
    None
}
