use crate::model::{FileIdx, Mapping, VolumeId};
use std::collections::BTreeSet;

/// A file that a committed plan puts somewhere else than it is now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PendingTransfer {
    pub file: FileIdx,
    pub source: VolumeId,
    pub target: VolumeId,
}

/// Pair files that leave one volume with files that arrive in another.
///
/// Target volumes are walked in order; each newly arriving file is sourced
/// from the first other volume it leaves. Files that arrive without leaving
/// anywhere (added meanwhile) are ignored.
pub(crate) fn derive_transfers(initial: &Mapping, target: &Mapping) -> Vec<PendingTransfer> {
    let leaving: Vec<BTreeSet<FileIdx>> = initial
        .iter()
        .zip(target)
        .map(|(before, after)| before.difference(after).copied().collect())
        .collect();

    let mut transfers = Vec::new();
    for (dst, (before, after)) in initial.iter().zip(target).enumerate() {
        for &file in after.difference(before) {
            let source = leaving
                .iter()
                .enumerate()
                .find(|&(src, left)| src != dst && left.contains(&file))
                .map(|(src, _)| src);
            if let Some(source) = source {
                transfers.push(PendingTransfer { file, source, target: dst });
            }
        }
    }
    transfers
}
