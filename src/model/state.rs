use super::blocks::BlockSizeTable;
use super::catalog::{FileCatalog, FileRecord};
use super::refcount::ReferenceCountMatrix;
use super::transfer::Transfer;
use super::{BlockId, FileIdx, Mapping, VolumeId};
use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A volume taking part in the migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct VolumeSpec {
    /// Path of the workload file the volume was loaded from.
    pub name: String,
    /// Desired share of the system size, as a fraction in `[0, 1]`.
    pub desired: f64,
}

/// Behavioural switches fixed when the state is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StateOptions {
    /// Removing an unknown file is an error instead of a logged no-op.
    pub strict_removals: bool,
    /// Keep only sampled blocks of files added by changes.
    pub filter_blocks: bool,
}

/// Running epoch numbers, used to label report blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EpochCounters {
    pub total: u32,
    pub migration: u32,
    pub change: u32,
}

impl EpochCounters {
    pub(crate) fn begin_migration(&mut self) {
        self.total += 1;
        self.migration += 1;
    }

    pub(crate) fn begin_change(&mut self) {
        self.total += 1;
        self.change += 1;
    }

    /// Label in the `<total>_m<migration>_c<change>` form.
    pub(crate) fn label(&self) -> String {
        format!("{}_m{}_c{}", self.total, self.migration, self.change)
    }
}

/// Everything the engines read and mutate: block table, reference counts,
/// file catalog, and the bookkeeping that survives between epochs.
#[derive(Debug, Clone)]
pub(crate) struct MigrationState {
    pub volumes: Vec<VolumeSpec>,
    pub blocks: BlockSizeTable,
    pub refs: ReferenceCountMatrix,
    pub catalog: FileCatalog,
    pub epochs: EpochCounters,
    pub options: StateOptions,
    /// Host id to input ids of that host's files, oldest first.
    pub host_history: HashMap<u32, Vec<String>>,
}

impl MigrationState {
    pub(crate) fn new(volumes: Vec<VolumeSpec>, options: StateOptions) -> Self {
        let n = volumes.len();
        Self {
            volumes,
            blocks: BlockSizeTable::new(),
            refs: ReferenceCountMatrix::new(n),
            catalog: FileCatalog::new(n),
            epochs: EpochCounters::default(),
            options,
            host_history: HashMap::new(),
        }
    }

    pub(crate) fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    pub(crate) fn volume_index(&self, name: &str) -> Result<VolumeId, PlanError> {
        self.volumes
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| PlanError::UnknownVolume { name: name.to_string() })
    }

    /// Desired shares as fractions, in volume order.
    pub(crate) fn desired(&self) -> Vec<f64> {
        self.volumes.iter().map(|v| v.desired).collect()
    }

    /// Intern a fingerprint and make sure it has a reference-count row.
    pub(crate) fn register_block(&mut self, fingerprint: &str) -> BlockId {
        let id = self.blocks.register(fingerprint);
        self.refs.ensure_block(id);
        id
    }

    /// Place a new file in `volume`. Block sizes must already be observed.
    pub(crate) fn attach_file(&mut self, record: FileRecord, volume: VolumeId) -> FileIdx {
        for &block in &record.blocks {
            self.refs.increment(block, volume, self.blocks.size(block));
        }
        self.catalog.insert(record, volume)
    }

    /// Drop a resident file from its volume. Returns the volume it left, or
    /// `None` if it was not resident.
    pub(crate) fn detach_file(&mut self, idx: FileIdx) -> Option<VolumeId> {
        let volume = self.catalog.volume_of(idx)?;
        for &block in &self.catalog.get(idx).blocks {
            self.refs.decrement(block, volume, self.blocks.size(block));
        }
        self.catalog.detach(idx)
    }

    /// Move a resident file, updating both reference views symmetrically.
    pub(crate) fn move_file(&mut self, idx: FileIdx, source: VolumeId, target: VolumeId) {
        if source == target {
            return;
        }
        for &block in &self.catalog.get(idx).blocks {
            let size = self.blocks.size(block);
            self.refs.decrement(block, source, size);
            self.refs.increment(block, target, size);
        }
        self.catalog.relocate(idx, source, target);
    }

    pub(crate) fn apply_transfer(&mut self, transfer: &Transfer) {
        self.move_file(transfer.file, transfer.source, transfer.target);
    }

    /// Current resident file sets, per volume.
    pub(crate) fn mapping(&self) -> Mapping {
        (0..self.num_volumes()).map(|v| self.catalog.files_in(v).clone()).collect()
    }

    /// Move files until the resident sets match `mapping`. Files that were
    /// removed since the mapping was computed are left alone.
    pub(crate) fn apply_mapping(&mut self, mapping: &Mapping) -> usize {
        let mut moved = 0;
        for (target, files) in mapping.iter().enumerate() {
            for &idx in files {
                match self.catalog.volume_of(idx) {
                    Some(source) if source != target => {
                        self.move_file(idx, source, target);
                        moved += 1;
                    }
                    _ => {}
                }
            }
        }
        moved
    }

    pub(crate) fn volume_sizes(&self) -> &[u64] {
        self.refs.volume_sizes()
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.refs.total_size()
    }

    /// Bytes of distinct blocks present anywhere in the system.
    pub(crate) fn distinct_size(&self) -> u64 {
        (0..self.refs.num_blocks())
            .filter(|&b| self.refs.holders(b).next().is_some())
            .map(|b| self.blocks.size(b))
            .sum()
    }
}
