use super::{BlockId, FileIdx, FileSn, VolumeId};
use std::collections::{BTreeSet, HashMap};

/// A file as the planner sees it: an ordered block recipe and its current
/// home.
#[derive(Debug, Clone)]
pub(crate) struct FileRecord {
    pub sn: FileSn,
    /// Input file id: the `IF` part of a snapshot name, e.g. `77` for
    /// `U12_H3_IF77_TS1000`.
    pub input_id: String,
    pub volume: Option<VolumeId>,
    /// `(block, size)` in recipe order. Blocks may repeat.
    pub recipe: Vec<(BlockId, u64)>,
    /// Distinct blocks of the recipe, sorted.
    pub blocks: Vec<BlockId>,
    /// Sum of the recipe sizes.
    pub size: u64,
    pub removed: bool,
}

impl FileRecord {
    pub(crate) fn new(sn: FileSn, input_id: String, recipe: Vec<(BlockId, u64)>) -> Self {
        let mut blocks: Vec<BlockId> = recipe.iter().map(|&(b, _)| b).collect();
        blocks.sort_unstable();
        blocks.dedup();
        let size = recipe.iter().map(|&(_, s)| s).sum();
        Self { sn, input_id, volume: None, recipe, blocks, size, removed: false }
    }
}

/// All files ever seen in the run, indexed densely by their algorithm
/// index, plus the per-volume resident sets.
#[derive(Debug, Clone)]
pub(crate) struct FileCatalog {
    files: Vec<FileRecord>,
    by_sn: HashMap<FileSn, FileIdx>,
    by_input: HashMap<String, FileIdx>,
    volume_files: Vec<BTreeSet<FileIdx>>,
    max_sn: FileSn,
}

impl FileCatalog {
    pub(crate) fn new(num_volumes: usize) -> Self {
        Self {
            files: Vec::new(),
            by_sn: HashMap::new(),
            by_input: HashMap::new(),
            volume_files: vec![BTreeSet::new(); num_volumes],
            max_sn: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    /// Number of files that are still resident in some volume.
    pub(crate) fn live_count(&self) -> usize {
        self.files.iter().filter(|f| !f.removed).count()
    }

    /// Next unused serial number.
    pub(crate) fn next_sn(&self) -> FileSn {
        self.max_sn + 1
    }

    /// Insert a record and place it in `volume`. Returns its algorithm
    /// index.
    pub(crate) fn insert(&mut self, mut record: FileRecord, volume: VolumeId) -> FileIdx {
        let idx = self.files.len();
        record.volume = Some(volume);
        record.removed = false;
        self.max_sn = self.max_sn.max(record.sn);
        self.by_sn.insert(record.sn, idx);
        self.by_input.insert(record.input_id.clone(), idx);
        self.volume_files[volume].insert(idx);
        self.files.push(record);
        idx
    }

    pub(crate) fn get(&self, idx: FileIdx) -> &FileRecord {
        &self.files[idx]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (FileIdx, &FileRecord)> {
        self.files.iter().enumerate()
    }

    pub(crate) fn index_of_sn(&self, sn: FileSn) -> Option<FileIdx> {
        self.by_sn.get(&sn).copied()
    }

    pub(crate) fn index_of_input(&self, input_id: &str) -> Option<FileIdx> {
        self.by_input.get(input_id).copied()
    }

    pub(crate) fn files_in(&self, volume: VolumeId) -> &BTreeSet<FileIdx> {
        &self.volume_files[volume]
    }

    pub(crate) fn volume_of(&self, idx: FileIdx) -> Option<VolumeId> {
        self.files[idx].volume
    }

    /// Move a resident file between volume sets.
    pub(crate) fn relocate(&mut self, idx: FileIdx, from: VolumeId, to: VolumeId) {
        self.volume_files[from].remove(&idx);
        self.volume_files[to].insert(idx);
        self.files[idx].volume = Some(to);
    }

    /// Detach a file from its volume and mark it removed. The record and
    /// its serial number stay in the catalog.
    pub(crate) fn detach(&mut self, idx: FileIdx) -> Option<VolumeId> {
        let record = &mut self.files[idx];
        let volume = record.volume.take()?;
        record.removed = true;
        self.volume_files[volume].remove(&idx);
        Some(volume)
    }
}
