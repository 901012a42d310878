mod ordering;
mod splitter;
mod transfers;

pub(crate) use ordering::SplitOrder;
pub(crate) use splitter::{SplitMode, TransferSplitter};
pub(crate) use transfers::{derive_transfers, PendingTransfer};

#[cfg(test)]
pub(crate) use ordering::RankedCandidate;
