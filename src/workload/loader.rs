use super::parser::{parse_line, WorkloadLine};
use crate::model::{FileRecord, MigrationState, StateOptions, VolumeSpec};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// A file line with its block serial numbers resolved to fingerprints.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedFile {
    pub sn: u64,
    pub input_id: String,
    pub recipe: Vec<(String, u64)>,
}

/// Read every file of a workload. Block serial numbers are local to the
/// workload file and are resolved through its own `B` lines.
pub(crate) fn read_workload(path: &Path) -> Result<Vec<ParsedFile>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open workload file: {}", path.display()))?;

    let mut fingerprints: HashMap<u64, String> = HashMap::new();
    let mut raw_files = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = parse_line(&line)
            .with_context(|| format!("{}:{}: malformed workload line", path.display(), line_no + 1))?;
        match parsed {
            Some(WorkloadLine::Block { sn, fingerprint }) => {
                fingerprints.insert(sn, fingerprint);
            }
            Some(WorkloadLine::File { sn, input_id, recipe }) => raw_files.push((sn, input_id, recipe)),
            None => {}
        }
    }

    raw_files
        .into_iter()
        .map(|(sn, input_id, recipe)| {
            let recipe = recipe
                .into_iter()
                .map(|(block_sn, size)| {
                    fingerprints.get(&block_sn).map(|fp| (fp.clone(), size)).with_context(|| {
                        format!("{}: file {} references unknown block {}", path.display(), sn, block_sn)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ParsedFile { sn, input_id, recipe })
        })
        .collect()
}

/// Intern a parsed file's blocks and place it in `volume`.
pub(crate) fn ingest_file(state: &mut MigrationState, parsed: ParsedFile, volume: usize) -> usize {
    let recipe = parsed
        .recipe
        .iter()
        .map(|(fingerprint, size)| {
            let block = state.register_block(fingerprint);
            (block, state.blocks.observe_size(block, *size))
        })
        .collect();
    state.attach_file(FileRecord::new(parsed.sn, parsed.input_id, recipe), volume)
}

/// Build the initial migration state from the volumes' workload files.
///
/// A workload that cannot be opened aborts the whole load.
pub(crate) fn load_state(volumes: Vec<VolumeSpec>, options: StateOptions) -> Result<MigrationState> {
    let paths: Vec<String> = volumes.iter().map(|v| v.name.clone()).collect();
    let mut state = MigrationState::new(volumes, options);

    for (volume, path) in paths.iter().enumerate() {
        let files = read_workload(Path::new(path))?;
        let count = files.len();
        for parsed in files {
            ingest_file(&mut state, parsed, volume);
        }
        debug!("Loaded {} files into volume {} ({})", count, volume, path);
    }

    info!(
        "Workloads loaded: {} volumes, {} files, {} blocks, {} bytes",
        state.num_volumes(),
        state.catalog.len(),
        state.blocks.len(),
        state.total_size()
    );

    Ok(state)
}
