use super::filter::is_sampled;
use super::policy::InsertPolicy;
use super::stream::{ChangeLine, ChangeStream};
use crate::error::PlanError;
use crate::model::{FileIdx, Mapping, MigrationState, VolumeId};
use crate::workload::{ingest_file, parse_snapshot_path, read_workload, ParsedFile};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

/// Files added and removed by one change batch, per volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChangeBatch {
    pub added: Mapping,
    pub removed: Mapping,
}

impl ChangeBatch {
    fn new(num_volumes: usize) -> Self {
        Self { added: vec![BTreeSet::new(); num_volumes], removed: vec![BTreeSet::new(); num_volumes] }
    }

    pub(crate) fn num_added(&self) -> usize {
        self.added.iter().map(BTreeSet::len).sum()
    }

    pub(crate) fn num_removed(&self) -> usize {
        self.removed.iter().map(BTreeSet::len).sum()
    }
}

/// Add the single file described by the workload file at `path` to
/// `volume`, under a fresh serial number.
pub(crate) fn add_file(
    state: &mut MigrationState,
    path: &Path,
    input_id: &str,
    host: u32,
    volume: VolumeId,
) -> Result<FileIdx> {
    let mut files = read_workload(path)?;
    if files.len() != 1 {
        return Err(PlanError::InvalidChangeFile {
            path: path.display().to_string(),
            reason: format!("expected exactly one file line, found {}", files.len()),
        }
        .into());
    }
    let mut parsed = files.remove(0);

    if state.options.filter_blocks {
        let before = parsed.recipe.len();
        parsed.recipe.retain(|(fingerprint, _)| is_sampled(fingerprint));
        debug!("Sampling kept {}/{} blocks of {}", parsed.recipe.len(), before, input_id);
    }

    let sn = state.catalog.next_sn();
    let idx = ingest_file(
        state,
        ParsedFile { sn, input_id: input_id.to_string(), recipe: parsed.recipe },
        volume,
    );
    state.host_history.entry(host).or_default().push(input_id.to_string());
    Ok(idx)
}

/// Remove the resident file with `input_id`. An unknown or already removed
/// file is a logged no-op unless the state asks for strict removals.
pub(crate) fn remove_file(
    state: &mut MigrationState,
    input_id: &str,
) -> Result<Option<(FileIdx, VolumeId)>, PlanError> {
    let resident = state
        .catalog
        .index_of_input(input_id)
        .and_then(|idx| state.catalog.volume_of(idx).map(|v| (idx, v)));

    let Some((idx, volume)) = resident else {
        if state.options.strict_removals {
            return Err(PlanError::UnknownFile { input_id: input_id.to_string() });
        }
        warn!("Ignoring removal of unknown file {}", input_id);
        return Ok(None);
    };

    state.detach_file(idx);
    Ok(Some((idx, volume)))
}

/// Feeds change batches from a change file into the migration state.
pub(crate) struct ChangeApplicator {
    stream: ChangeStream,
    policy: InsertPolicy,
    rng: StdRng,
    batches: VecDeque<usize>,
}

impl ChangeApplicator {
    pub(crate) fn new(stream: ChangeStream, policy: InsertPolicy, seed: u64, batches: Vec<usize>) -> Self {
        Self { stream, policy, rng: StdRng::seed_from_u64(seed), batches: batches.into() }
    }

    /// Read and apply the next batch. `None` once every batch was applied.
    pub(crate) fn apply_next(&mut self, state: &mut MigrationState) -> Result<Option<ChangeBatch>> {
        let Some(count) = self.batches.pop_front() else {
            return Ok(None);
        };

        let lines = self.stream.next_batch(count)?;
        let mut batch = ChangeBatch::new(state.num_volumes());
        for line in &lines {
            self.apply_line(state, line, &mut batch)?;
        }

        info!(
            "Applied change batch: {} lines, {} added, {} removed",
            lines.len(),
            batch.num_added(),
            batch.num_removed()
        );
        Ok(Some(batch))
    }

    fn apply_line(
        &mut self,
        state: &mut MigrationState,
        line: &ChangeLine,
        batch: &mut ChangeBatch,
    ) -> Result<()> {
        if let Some(path) = &line.add {
            let Some(snapshot) = parse_snapshot_path(path) else {
                warn!("Skipping addition with unparsable name: {}", path);
                return Ok(());
            };
            let volume = self.policy.choose(state, &mut self.rng, snapshot.host)?;
            debug!(
                "Adding {} (user {}, taken {}) to volume {}",
                snapshot.input_id, snapshot.user, snapshot.timestamp, volume
            );
            let idx = add_file(state, Path::new(path), &snapshot.input_id, snapshot.host, volume)?;
            batch.added[volume].insert(idx);
        }

        if let Some(input_id) = line.removed_input_id() {
            if let Some((idx, volume)) = remove_file(state, &input_id)? {
                batch.removed[volume].insert(idx);
            }
        }
        Ok(())
    }
}
