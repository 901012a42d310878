mod lock;
mod memory;
mod sqlite;

pub(crate) use lock::FileLock;
pub(crate) use memory::MemoryCache;
pub(crate) use sqlite::SqliteCache;

use crate::cost::VolumeCost;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored outcome of one cost evaluation: the raw figures of every volume,
/// by volume name. Validity is re-derived on every read because budgets and
/// margins are not part of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CachedCost {
    pub volumes: BTreeMap<String, VolumeCost>,
}

/// Memoization of cost evaluations. Entries never expire.
///
/// Implementations are best effort: a failed read is a miss and a failed
/// write is dropped.
pub(crate) trait CostCache {
    fn get(&self, key: &str) -> Option<CachedCost>;
    fn put(&self, key: &str, record: &CachedCost);
}
