use super::lock::FileLock;
use super::{CachedCost, CostCache};
use crate::db::Database;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cost cache shared between processes through a SQLite file.
///
/// Every access holds an exclusive advisory lock on `<db>.lock`. When the
/// lock cannot be taken within the retry budget the access is skipped: a
/// read becomes a miss and a write is dropped.
#[derive(Debug)]
pub(crate) struct SqliteCache {
    db: Database,
    lock_path: PathBuf,
    lock_attempts: u32,
    lock_sleep: Duration,
}

impl SqliteCache {
    pub(crate) fn open(path: &Path, lock_attempts: u32, lock_sleep: Duration) -> Result<Self> {
        let db = Database::open(path)?;
        let lock_path = lock_path_for(path);
        {
            let _guard = FileLock::acquire(&lock_path, lock_attempts, lock_sleep)?;
            db.run_migrations()?;
        }
        info!("Cost cache ready at {}", path.display());
        Ok(Self { db, lock_path, lock_attempts, lock_sleep })
    }

    /// Cache over an existing database, locking through `lock_path`.
    #[cfg(test)]
    pub(crate) fn with_database(db: Database, lock_path: PathBuf) -> Result<Self> {
        db.run_migrations()?;
        Ok(Self { db, lock_path, lock_attempts: 2, lock_sleep: Duration::from_millis(10) })
    }

    /// Number of stored cost records, or `None` when the lock or the query
    /// fails.
    pub(crate) fn stored(&self) -> Option<i64> {
        let _guard = self.lock()?;
        match self.db.count_cost_records() {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Failed to count cost records: {:#}", e);
                None
            }
        }
    }

    fn lock(&self) -> Option<FileLock> {
        match FileLock::acquire(&self.lock_path, self.lock_attempts, self.lock_sleep) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Cost cache unavailable, computing directly: {:#}", e);
                None
            }
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl CostCache for SqliteCache {
    fn get(&self, key: &str) -> Option<CachedCost> {
        let _guard = self.lock()?;
        let row = match self.db.get_cost_record(key) {
            Ok(row) => row?,
            Err(e) => {
                warn!("Cost cache read failed: {:#}", e);
                return None;
            }
        };
        match serde_json::from_str(&row.record) {
            Ok(record) => {
                debug!("Cost cache hit {} (stored {})", row.cache_key, row.created_at);
                Some(record)
            }
            Err(e) => {
                warn!("Discarding unreadable cost record {}: {}", key, e);
                None
            }
        }
    }

    fn put(&self, key: &str, record: &CachedCost) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode cost record {}: {}", key, e);
                return;
            }
        };
        let Some(_guard) = self.lock() else {
            return;
        };
        if let Err(e) = self.db.put_cost_record(key, &json) {
            warn!("Cost cache write failed: {:#}", e);
        }
    }
}
