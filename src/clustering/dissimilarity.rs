use crate::model::{BlockId, FileIdx, MigrationState, VolumeId};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Pairwise entry of the dissimilarity matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DissimilarityCell {
    /// Jaccard distance of the two clusters' blocks. `None` once either
    /// cluster is gone.
    pub jaccard: Option<f64>,
    /// Bytes the pair's files bring from each volume they started in.
    pub origins: BTreeMap<VolumeId, u64>,
}

impl DissimilarityCell {
    fn inactive() -> Self {
        Self::default()
    }
}

/// Symmetric matrix over the clusters, stored as a lower triangle with the
/// diagonal. Diagonal cells hold a cluster's own origin map.
///
/// The matrix built from the initial placement is kept aside so that every
/// clustering attempt starts from the same values.
#[derive(Debug, Clone)]
pub(crate) struct DissimilarityMatrix {
    pristine: Vec<Vec<DissimilarityCell>>,
    cells: Vec<Vec<DissimilarityCell>>,
}

/// `|A xor B| / |A or B|` over two sorted, distinct block lists. Two empty
/// lists are at distance 0.
pub(crate) fn jaccard_distance(a: &[BlockId], b: &[BlockId]) -> f64 {
    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        return 0.0;
    }
    (union - shared) as f64 / union as f64
}

/// `a + b - subtract`, key by key.
fn merge_origins(
    a: &BTreeMap<VolumeId, u64>,
    b: &BTreeMap<VolumeId, u64>,
    subtract: &BTreeMap<VolumeId, u64>,
) -> BTreeMap<VolumeId, u64> {
    let mut merged = a.clone();
    for (&volume, &bytes) in b {
        *merged.entry(volume).or_default() += bytes;
    }
    for (&volume, &bytes) in subtract {
        if let Some(entry) = merged.get_mut(&volume) {
            *entry = entry.saturating_sub(bytes);
        }
    }
    merged
}

impl DissimilarityMatrix {
    /// Build the matrix for every file of the catalog. `sizes[f]` is the
    /// distinct size of file `f`. Removed files start out inactive.
    pub(crate) fn build(state: &MigrationState, sizes: &[u64]) -> Self {
        let n = state.catalog.len();
        let origin = |f: FileIdx| state.catalog.volume_of(f);
        let mut cells: Vec<Vec<DissimilarityCell>> = Vec::with_capacity(n);

        for i in 0..n {
            let mut row = Vec::with_capacity(i + 1);
            let Some(origin_i) = origin(i) else {
                row.resize(i + 1, DissimilarityCell::inactive());
                cells.push(row);
                continue;
            };
            let blocks_i = &state.catalog.get(i).blocks;

            for j in 0..i {
                let Some(origin_j) = origin(j) else {
                    row.push(DissimilarityCell::inactive());
                    continue;
                };
                let mut origins = BTreeMap::from([(origin_i, sizes[i])]);
                *origins.entry(origin_j).or_default() += sizes[j];
                row.push(DissimilarityCell {
                    jaccard: Some(jaccard_distance(blocks_i, &state.catalog.get(j).blocks)),
                    origins,
                });
            }
            row.push(DissimilarityCell {
                jaccard: Some(0.0),
                origins: BTreeMap::from([(origin_i, sizes[i])]),
            });
            cells.push(row);
        }

        Self { pristine: cells.clone(), cells }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Back to the values of the initial placement.
    pub(crate) fn reset(&mut self) {
        self.cells.clone_from(&self.pristine);
    }

    pub(crate) fn cell(&self, a: usize, b: usize) -> &DissimilarityCell {
        let (row, col) = if a >= b { (a, b) } else { (b, a) };
        &self.cells[row][col]
    }

    fn set(&mut self, a: usize, b: usize, cell: DissimilarityCell) {
        let (row, col) = if a >= b { (a, b) } else { (b, a) };
        self.cells[row][col] = cell;
    }

    /// Complete linkage for merging `absorbed` into `kept`: every other
    /// cluster's distance to `kept` becomes the larger of its two distances,
    /// and origin bytes are summed with the shared part counted once.
    pub(crate) fn link(&mut self, kept: usize, absorbed: usize) {
        for i in 0..self.len() {
            let from_absorbed = self.cell(absorbed, i);
            let Some(jaccard_absorbed) = from_absorbed.jaccard else {
                continue;
            };
            let from_kept = self.cell(kept, i);
            let merged = DissimilarityCell {
                jaccard: Some(jaccard_absorbed.max(from_kept.jaccard.unwrap_or(0.0))),
                origins: merge_origins(
                    &from_absorbed.origins,
                    &from_kept.origins,
                    &self.cell(i, i).origins,
                ),
            };
            self.set(kept, i, merged);
        }
    }

    /// Remove a cluster from every pair it takes part in.
    pub(crate) fn deactivate(&mut self, cluster: usize) {
        for i in 0..self.len() {
            self.set(cluster, i, DissimilarityCell::inactive());
        }
    }
}

/// Weights of the distance between two clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DistanceWeights {
    /// Traffic weight `W_T` in `[0, 1]`.
    pub wt: f64,
    pub num_volumes: usize,
    /// Scale the physical distance by the share of bytes that would move.
    pub use_new_metric: bool,
}

/// Share of volumes the pair's files come from, optionally scaled by the
/// fraction of their bytes that lives outside the dominant origin.
pub(crate) fn physical_distance(cell: &DissimilarityCell, weights: &DistanceWeights) -> f64 {
    let fraction = cell.origins.len() as f64 / weights.num_volumes.max(1) as f64;
    if !weights.use_new_metric {
        return fraction;
    }

    let summed: u64 = cell.origins.values().sum();
    let largest = cell.origins.values().copied().max().unwrap_or(0);
    if summed == 0 {
        return 0.0;
    }
    let moved = (summed as f64 - (1.0 - weights.wt) * largest as f64) / summed as f64;
    moved * fraction
}

/// `(1 - W_T) * physical + W_T * jaccard`, or `None` for an inactive pair.
pub(crate) fn distance(cell: &DissimilarityCell, weights: &DistanceWeights) -> Option<f64> {
    let jaccard = cell.jaccard?;
    Some((1.0 - weights.wt) * physical_distance(cell, weights) + weights.wt * jaccard)
}
