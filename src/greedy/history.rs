use crate::model::FileSn;

const CAPACITY: usize = 2;

/// The last two moved files, newest first. Used to stop the search from
/// bouncing a file back and forth between two volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoopHistory {
    slots: [Option<FileSn>; CAPACITY],
}

impl LoopHistory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn remember(&mut self, sn: FileSn) {
        self.slots.rotate_right(1);
        self.slots[0] = Some(sn);
    }

    pub(crate) fn contains(&self, sn: FileSn) -> bool {
        self.slots.contains(&Some(sn))
    }

    pub(crate) fn is_most_recent(&self, sn: FileSn) -> bool {
        self.slots[0] == Some(sn)
    }
}
