use super::key::cost_cache_key;
use super::result::{CostParams, CostResult, VolumeCost};
use crate::cache::{CachedCost, CostCache};
use crate::model::{BlockId, FileCatalog, FileIdx, Mapping, MigrationState};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// The mappings one evaluation compares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CostInput<'a> {
    pub initial: &'a Mapping,
    pub target: &'a Mapping,
    /// Files added by changes during the evaluated epoch, per volume.
    pub added: Option<&'a Mapping>,
    /// Files removed by changes during the evaluated epoch, per volume.
    pub removed: Option<&'a Mapping>,
}

impl<'a> CostInput<'a> {
    pub(crate) const fn plan(initial: &'a Mapping, target: &'a Mapping) -> Self {
        Self { initial, target, added: None, removed: None }
    }
}

/// Scores final mappings against initial ones, with optional memoization.
pub(crate) struct CostCalculator<'c> {
    cache: Option<&'c dyn CostCache>,
    scope: String,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<'c> CostCalculator<'c> {
    pub(crate) fn new(cache: Option<&'c dyn CostCache>, scope: impl Into<String>) -> Self {
        Self { cache, scope: scope.into(), hits: Cell::new(0), misses: Cell::new(0) }
    }

    /// Cache hits and misses so far.
    pub(crate) fn stats(&self) -> (usize, usize) {
        (self.hits.get(), self.misses.get())
    }

    pub(crate) fn evaluate(
        &self,
        state: &MigrationState,
        input: CostInput<'_>,
        params: &CostParams,
    ) -> CostResult {
        let names: Vec<String> = state.volumes.iter().map(|v| v.name.clone()).collect();

        let Some(cache) = self.cache else {
            let volumes = compute_volume_costs(state, input);
            return CostResult::from_volumes(names, volumes, params);
        };

        let key = cost_cache_key(
            &names,
            &state.catalog,
            input.initial,
            input.target,
            input.added,
            input.removed,
            &self.scope,
        );

        if let Some(record) = cache.get(&key) {
            if let Some(volumes) = record_volumes(&record, &names) {
                self.hits.set(self.hits.get() + 1);
                return CostResult::from_volumes(names, volumes, params);
            }
            debug!("Cached cost {} does not cover the current volumes, recomputing", key);
        }

        self.misses.set(self.misses.get() + 1);
        let volumes = compute_volume_costs(state, input);
        let record = CachedCost {
            volumes: names.iter().cloned().zip(volumes.iter().copied()).collect::<BTreeMap<_, _>>(),
        };
        cache.put(&key, &record);
        CostResult::from_volumes(names, volumes, params)
    }
}

fn record_volumes(record: &CachedCost, names: &[String]) -> Option<Vec<VolumeCost>> {
    names.iter().map(|name| record.volumes.get(name).copied()).collect()
}

/// Per-volume figures for one evaluation, in volume order.
pub(crate) fn compute_volume_costs(state: &MigrationState, input: CostInput<'_>) -> Vec<VolumeCost> {
    let empty = BTreeSet::new();
    (0..state.num_volumes())
        .map(|v| {
            let added = input.added.map_or(&empty, |m| &m[v]);
            let removed = input.removed.map_or(&empty, |m| &m[v]);
            volume_cost(state, &input.initial[v], &input.target[v], added, removed)
        })
        .collect()
}

fn blocks_of<'a>(catalog: &FileCatalog, files: impl IntoIterator<Item = &'a FileIdx>) -> HashSet<BlockId> {
    files.into_iter().flat_map(|&f| catalog.get(f).blocks.iter().copied()).collect()
}

fn volume_cost(
    state: &MigrationState,
    initial: &BTreeSet<FileIdx>,
    target: &BTreeSet<FileIdx>,
    added: &BTreeSet<FileIdx>,
    removed: &BTreeSet<FileIdx>,
) -> VolumeCost {
    let catalog = &state.catalog;
    let size = |b: BlockId| state.blocks.size(b);

    // State the migration alone would have produced.
    let target_without_changes: BTreeSet<FileIdx> =
        target.union(removed).filter(|f| !added.contains(f)).copied().collect();
    let initial_without_removed = initial.difference(removed);

    let initial_blocks = blocks_of(catalog, initial);
    let target_blocks = blocks_of(catalog, target);
    let unchanged_target_blocks = blocks_of(catalog, &target_without_changes);
    let surviving_initial_blocks = blocks_of(catalog, initial_without_removed);
    let added_blocks = blocks_of(catalog, added);

    let mut cost = VolumeCost::default();
    for &b in &initial_blocks {
        cost.init_size += size(b);
        if !target_blocks.contains(&b) {
            cost.deleted += size(b);
        }
    }

    let mut only_migration = 0;
    for &b in &unchanged_target_blocks {
        if initial_blocks.contains(&b) {
            if !surviving_initial_blocks.contains(&b) && target_blocks.contains(&b) {
                cost.block_reuse += size(b);
            }
        } else if !target_blocks.contains(&b) {
            cost.aborted_traffic += size(b);
        } else if added_blocks.contains(&b) {
            cost.overlap_traffic += size(b);
            cost.received += size(b);
        } else {
            only_migration += size(b);
            cost.received += size(b);
        }
    }

    for &b in &added_blocks {
        if !initial_blocks.contains(&b) && !unchanged_target_blocks.contains(&b) {
            cost.received += size(b);
        }
    }

    cost.traffic = only_migration + (cost.aborted_traffic + cost.overlap_traffic) / 2;
    cost
}
