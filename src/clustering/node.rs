use crate::model::{BlockId, FileIdx, MigrationState};
use std::collections::{BTreeSet, HashSet};

/// A cluster of files. Seeded from a single file, the anchor, and grown by
/// merges.
#[derive(Debug, Clone)]
pub(crate) struct ClusterNode {
    anchor: FileIdx,
    files: BTreeSet<FileIdx>,
    blocks: HashSet<BlockId>,
    /// Bytes of the distinct blocks of all member files.
    size: u64,
    anchor_blocks: HashSet<BlockId>,
    anchor_size: u64,
    active: bool,
}

impl ClusterNode {
    pub(crate) fn seed(state: &MigrationState, anchor: FileIdx) -> Self {
        let record = state.catalog.get(anchor);
        let blocks: HashSet<BlockId> = record.blocks.iter().copied().collect();
        let size = state.blocks.total(&blocks);
        Self {
            anchor,
            files: BTreeSet::from([anchor]),
            anchor_blocks: blocks.clone(),
            anchor_size: size,
            blocks,
            size,
            active: !record.removed,
        }
    }

    pub(crate) fn files(&self) -> &BTreeSet<FileIdx> {
        &self.files
    }

    pub(crate) fn blocks(&self) -> &HashSet<BlockId> {
        &self.blocks
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn disable(&mut self) {
        self.active = false;
    }

    /// Size the union of two clusters would have.
    pub(crate) fn merged_size(&self, other: &Self, state: &MigrationState) -> u64 {
        let (small, large) =
            if self.blocks.len() <= other.blocks.len() { (self, other) } else { (other, self) };
        let shared = state.blocks.total(small.blocks.iter().filter(|b| large.blocks.contains(b)));
        self.size + other.size - shared
    }

    /// Absorb `other` into this cluster.
    pub(crate) fn absorb(&mut self, other: &Self, state: &MigrationState) {
        self.size = self.merged_size(other, state);
        self.files.extend(other.files.iter().copied());
        self.blocks.extend(other.blocks.iter().copied());
    }

    /// Back to the single anchor file. A removed anchor stays disabled.
    pub(crate) fn reset(&mut self, state: &MigrationState) {
        self.files = BTreeSet::from([self.anchor]);
        self.blocks.clone_from(&self.anchor_blocks);
        self.size = self.anchor_size;
        self.active = !state.catalog.get(self.anchor).removed;
    }
}
