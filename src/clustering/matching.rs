use super::node::ClusterNode;
use crate::model::{BlockId, Mapping, MigrationState};
use std::collections::{BTreeSet, HashSet};

const TAKEN: i64 = -1;

/// Position of the largest cell, first one on ties. `None` once every cell
/// is taken.
pub(crate) fn find_max(matrix: &[Vec<i64>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut best_value = TAKEN;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            if value > best_value {
                best_value = value;
                best = Some((i, j));
            }
        }
    }
    best
}

/// Give every volume the final cluster it shares the most blocks with.
///
/// Pairs are fixed greedily: the globally largest intersection first, then
/// its row and column are struck out. Volumes left without a cluster end up
/// empty.
pub(crate) fn match_clusters(state: &MigrationState, initial: &Mapping, clusters: &[&ClusterNode]) -> Mapping {
    let volume_blocks: Vec<HashSet<BlockId>> = initial
        .iter()
        .map(|files| files.iter().flat_map(|&f| state.catalog.get(f).blocks.iter().copied()).collect())
        .collect();

    let mut intersections: Vec<Vec<i64>> = volume_blocks
        .iter()
        .map(|blocks| {
            clusters
                .iter()
                .map(|c| blocks.iter().filter(|b| c.blocks().contains(b)).count() as i64)
                .collect()
        })
        .collect();

    let mut mapping: Mapping = vec![BTreeSet::new(); initial.len()];
    for _ in 0..initial.len() {
        let Some((volume, cluster)) = find_max(&intersections) else {
            break;
        };
        intersections[volume].fill(TAKEN);
        for row in &mut intersections {
            row[cluster] = TAKEN;
        }
        mapping[volume].clone_from(clusters[cluster].files());
    }
    mapping
}
