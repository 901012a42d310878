use super::Database;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

/// A stored cost record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CostRecordRow {
    pub cache_key: String,
    /// JSON encoded per-volume figures.
    pub record: String,
    pub created_at: String,
}

impl Database {
    pub(crate) fn get_cost_record(&self, cache_key: &str) -> Result<Option<CostRecordRow>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT cache_key, record, created_at FROM cost_cache WHERE cache_key = ?1",
                params![cache_key],
                |row| {
                    Ok(CostRecordRow {
                        cache_key: row.get(0)?,
                        record: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a record. An existing record for the key is kept: equal keys
    /// always describe the same evaluation.
    pub(crate) fn put_cost_record(&self, cache_key: &str, record: &str) -> Result<bool> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO cost_cache (cache_key, record, created_at) VALUES (?1, ?2, ?3)",
            params![cache_key, record, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    pub(crate) fn count_cost_records(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM cost_cache", [], |row| row.get(0))?)
    }
}
