mod cost_queries;

pub(crate) use cost_queries::CostRecordRow;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// SQLite connection holding the persistent cost cache.
///
/// Several planner processes may share one cache file. WAL mode lets them
/// read concurrently; writers are serialized by SQLite and, around each
/// access, by the cache's advisory file lock.
pub(crate) struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

impl Database {
    /// Open (or create) the cache database at the given path.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Bring the schema up to date.
    pub(crate) fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let has_schema_table: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master \
                 WHERE type='table' AND name='schema_version'",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for schema_version table")?;

        let current_version = if has_schema_table {
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
                row.get::<_, i64>(0)
            })
            .context("Failed to read schema version")?
        } else {
            0
        };

        if current_version < 1 {
            info!("Applying migration 001_cost_cache...");
            conn.execute_batch(include_str!("../../migrations/001_cost_cache.sql"))?;
        }

        Ok(())
    }

    /// Lock the connection for a query. A poisoned lock is taken over, the
    /// connection itself stays usable.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
