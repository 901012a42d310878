use super::BlockId;
use std::collections::HashMap;
use tracing::warn;

/// Global block registry: fingerprint interning plus the byte size of each
/// block.
///
/// A size of 0 marks a block that has been registered but not yet observed
/// in any file recipe. The first observed size is kept for the whole run.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockSizeTable {
    sizes: Vec<u64>,
    fingerprints: Vec<String>,
    by_fingerprint: HashMap<String, BlockId>,
}

impl BlockSizeTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Return the id of `fingerprint`, allocating the next dense id if it
    /// has not been seen before.
    pub(crate) fn register(&mut self, fingerprint: &str) -> BlockId {
        if let Some(&id) = self.by_fingerprint.get(fingerprint) {
            return id;
        }
        let id = self.sizes.len();
        self.sizes.push(0);
        self.fingerprints.push(fingerprint.to_string());
        self.by_fingerprint.insert(fingerprint.to_string(), id);
        id
    }

    pub(crate) fn size(&self, block: BlockId) -> u64 {
        self.sizes[block]
    }

    /// Record the size of `block`. First size wins; a later disagreeing
    /// size is logged and ignored. Returns the size now on record.
    pub(crate) fn observe_size(&mut self, block: BlockId, size: u64) -> u64 {
        let current = self.sizes[block];
        if current == 0 {
            self.sizes[block] = size;
            return size;
        }
        if current != size {
            warn!(
                "Block size mismatch for {}: keeping {} bytes, ignoring {} bytes",
                self.fingerprints[block], current, size
            );
        }
        current
    }

    /// Sum of the sizes of the given blocks.
    pub(crate) fn total<'a>(&self, blocks: impl IntoIterator<Item = &'a BlockId>) -> u64 {
        blocks.into_iter().map(|&b| self.sizes[b]).sum()
    }
}
