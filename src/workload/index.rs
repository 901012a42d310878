use super::identity::parse_snapshot_name;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    snap_name: String,
}

/// `{ "<user>": { "<host>": [ { "snap_name": ... }, ... ] } }`
type RawIndex = BTreeMap<String, BTreeMap<String, Vec<SnapshotEntry>>>;

/// Host id to the input ids of its snapshots, in index order (oldest
/// first).
pub(crate) fn parse_files_index(contents: &str) -> Result<HashMap<u32, Vec<String>>> {
    let raw: RawIndex = serde_json::from_str(contents).context("Malformed files index JSON")?;

    let mut hosts = HashMap::new();
    for (user, host_map) in raw {
        for (host, snapshots) in host_map {
            let host_id: u32 = host
                .parse()
                .with_context(|| format!("Invalid host id {host:?} for user {user}"))?;
            let mut ordered = Vec::with_capacity(snapshots.len());
            for entry in snapshots {
                let Some(snapshot) = parse_snapshot_name(&entry.snap_name) else {
                    bail!("Invalid snapshot name {:?} in files index", entry.snap_name);
                };
                ordered.push(snapshot.input_id);
            }
            hosts.insert(host_id, ordered);
        }
    }
    Ok(hosts)
}

pub(crate) fn load_files_index(path: &Path) -> Result<HashMap<u32, Vec<String>>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to open files index: {}", path.display()))?;
    parse_files_index(&contents)
}
