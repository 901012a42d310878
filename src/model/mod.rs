mod blocks;
mod catalog;
mod refcount;
mod state;
mod transfer;

pub(crate) use blocks::BlockSizeTable;
pub(crate) use catalog::{FileCatalog, FileRecord};
pub(crate) use refcount::ReferenceCountMatrix;
pub(crate) use state::{EpochCounters, MigrationState, StateOptions, VolumeSpec};
pub(crate) use transfer::Transfer;

use std::collections::BTreeSet;

/// Dense block index, assigned on first sight of a fingerprint.
pub(crate) type BlockId = usize;
/// Position of a volume in the volume list.
pub(crate) type VolumeId = usize;
/// Dense, 0-based file index used by the engines.
pub(crate) type FileIdx = usize;
/// External file serial number, stable for the run.
pub(crate) type FileSn = u64;

/// Resident file set per volume.
pub(crate) type Mapping = Vec<BTreeSet<FileIdx>>;
