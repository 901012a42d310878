#[cfg(test)]
use super::blocks::BlockSizeTable;
use super::{BlockId, VolumeId};
use tracing::warn;

/// Per-block, per-volume reference counters with cached volume sizes.
///
/// Every volume is both a migration source and a migration target, so a
/// single count serves both views. `volume_sizes[v]` always equals the sum
/// of the sizes of blocks whose count in `v` is non-zero.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceCountMatrix {
    counts: Vec<Vec<u32>>,
    volume_sizes: Vec<u64>,
}

impl ReferenceCountMatrix {
    pub(crate) fn new(num_volumes: usize) -> Self {
        Self { counts: Vec::new(), volume_sizes: vec![0; num_volumes] }
    }

    pub(crate) fn num_blocks(&self) -> usize {
        self.counts.len()
    }

    /// Grow the matrix so that `block` has a (zeroed) row.
    pub(crate) fn ensure_block(&mut self, block: BlockId) {
        let width = self.volume_sizes.len();
        while self.counts.len() <= block {
            self.counts.push(vec![0; width]);
        }
    }

    pub(crate) fn count(&self, block: BlockId, volume: VolumeId) -> u32 {
        self.counts.get(block).map_or(0, |row| row[volume])
    }

    pub(crate) fn increment(&mut self, block: BlockId, volume: VolumeId, size: u64) {
        self.ensure_block(block);
        let cell = &mut self.counts[block][volume];
        *cell += 1;
        if *cell == 1 {
            self.volume_sizes[volume] += size;
        }
    }

    pub(crate) fn decrement(&mut self, block: BlockId, volume: VolumeId, size: u64) {
        let Some(cell) = self.counts.get_mut(block).map(|row| &mut row[volume]) else {
            warn!("Decrement of unknown block {} in volume {}", block, volume);
            return;
        };
        if *cell == 0 {
            warn!("Decrement of unreferenced block {} in volume {}", block, volume);
            return;
        }
        *cell -= 1;
        if *cell == 0 {
            self.volume_sizes[volume] = self.volume_sizes[volume].saturating_sub(size);
        }
    }

    pub(crate) fn volume_sizes(&self) -> &[u64] {
        &self.volume_sizes
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.volume_sizes.iter().sum()
    }

    /// Volumes in which `block` currently has a non-zero count.
    pub(crate) fn holders(&self, block: BlockId) -> impl Iterator<Item = VolumeId> + '_ {
        self.counts
            .get(block)
            .into_iter()
            .flat_map(|row| row.iter().enumerate().filter(|&(_, &c)| c > 0).map(|(v, _)| v))
    }

    /// Volume sizes computed from scratch, ignoring the cache.
    #[cfg(test)]
    pub(crate) fn recompute_sizes(&self, blocks: &BlockSizeTable) -> Vec<u64> {
        let mut sizes = vec![0; self.volume_sizes.len()];
        for (block, row) in self.counts.iter().enumerate() {
            for (volume, &count) in row.iter().enumerate() {
                if count > 0 {
                    sizes[volume] += blocks.size(block);
                }
            }
        }
        sizes
    }
}
