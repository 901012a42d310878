mod identity;
mod index;
mod loader;
mod parser;
mod volumes;

pub(crate) use identity::{parse_snapshot_path, SnapshotId};
pub(crate) use index::load_files_index;
pub(crate) use loader::{ingest_file, load_state, read_workload, ParsedFile};
pub(crate) use volumes::load_volume_list;

#[cfg(test)]
pub(crate) use identity::parse_snapshot_name;
#[cfg(test)]
pub(crate) use index::parse_files_index;
#[cfg(test)]
pub(crate) use parser::{parse_line, WorkloadLine};
#[cfg(test)]
pub(crate) use volumes::parse_volume_list;
