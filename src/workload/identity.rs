use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// `U<user>_H<host>_IF<inputId>_TS<timestamp>`; the input id runs up to the
/// first `_TS`.
static SNAPSHOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^U(?P<user>[^_]+)_H(?P<host>\d+)_IF(?P<id>.+?)_TS(?P<ts>.*)$")
        .expect("snapshot name pattern is valid")
});

/// The parts of a backup snapshot name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SnapshotId {
    pub user: String,
    pub host: u32,
    pub input_id: String,
    pub timestamp: String,
}

pub(crate) fn parse_snapshot_name(name: &str) -> Option<SnapshotId> {
    let caps = SNAPSHOT_RE.captures(name)?;
    Some(SnapshotId {
        user: caps["user"].to_string(),
        host: caps["host"].parse().ok()?,
        input_id: caps["id"].to_string(),
        timestamp: caps["ts"].to_string(),
    })
}

/// Parse the base name of a path as a snapshot name.
pub(crate) fn parse_snapshot_path(path: &str) -> Option<SnapshotId> {
    let base = Path::new(path).file_name()?.to_str()?;
    parse_snapshot_name(base)
}
