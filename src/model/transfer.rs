use super::{FileIdx, FileSn, VolumeId};
use serde::Serialize;

/// A single file move and what it costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Transfer {
    pub source: VolumeId,
    pub target: VolumeId,
    pub file: FileIdx,
    pub file_sn: FileSn,
    /// Bytes that must be copied while the source keeps its copy.
    pub replicated: u64,
    /// Bytes freed in the source because the target already holds them.
    pub deleted: u64,
    /// Bytes copied and then freed in the source.
    pub moved: u64,
    /// Bytes sent over the wire.
    pub traffic: u64,
}

impl Transfer {
    /// `replicated / max(1, deleted)`; lower is better.
    pub(crate) fn reclaim_ratio(&self) -> f64 {
        self.replicated as f64 / self.deleted.max(1) as f64
    }
}
