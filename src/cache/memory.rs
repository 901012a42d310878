use super::{CachedCost, CostCache};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Process-local cost cache.
#[derive(Debug, Default)]
pub(crate) struct MemoryCache {
    entries: Mutex<HashMap<String, CachedCost>>,
}

impl MemoryCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl CostCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedCost> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn put(&self, key: &str, record: &CachedCost) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), record.clone());
    }
}
