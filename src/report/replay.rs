use super::plan_csv::VOLUME_HEADER;
use crate::cost::{CostCalculator, CostInput, CostParams, CostResult};
use crate::model::{FileIdx, FileSn, Mapping, MigrationState};
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// One block of a plan report, resolved against the loaded catalog.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReplayedBlock {
    pub label: String,
    pub max_traffic: u64,
    pub initial: Mapping,
    pub target: Mapping,
    /// Serial numbers that did not resolve to a known file.
    pub skipped: usize,
}

fn resolve_sns(state: &MigrationState, field: &str, skipped: &mut usize) -> Result<BTreeSet<FileIdx>> {
    let mut files = BTreeSet::new();
    for token in field.split('-').map(str::trim).filter(|t| !t.is_empty()) {
        let sn: FileSn = token.parse().with_context(|| format!("Invalid file SN {token:?} in plan"))?;
        match state.catalog.index_of_sn(sn) {
            Some(idx) => {
                files.insert(idx);
            }
            None => {
                warn!("Plan references file SN {} which is not loaded, skipping", sn);
                *skipped += 1;
            }
        }
    }
    Ok(files)
}

/// Read every block of a migration plan report. Volume rows are matched to
/// the state's volumes by name.
pub(crate) fn parse_plan(contents: &str, state: &MigrationState) -> Result<Vec<ReplayedBlock>> {
    let n = state.num_volumes();
    let mut blocks = Vec::new();
    let mut lines = contents.lines().map(|l| l.trim_end_matches('\r'));
    let mut label = String::new();
    let mut max_traffic = 0;

    while let Some(line) = lines.next() {
        if line.starts_with("Server name") {
            let Some(values) = lines.next() else {
                bail!("Plan header without values");
            };
            let fields: Vec<&str> = values.split(',').map(str::trim).collect();
            label = fields.get(1).copied().unwrap_or_default().to_string();
            max_traffic = fields.get(2).and_then(|f| f.parse().ok()).unwrap_or(0);
            continue;
        }
        if line != VOLUME_HEADER {
            continue;
        }

        let mut block = ReplayedBlock {
            label: label.clone(),
            max_traffic,
            initial: vec![BTreeSet::new(); n],
            target: vec![BTreeSet::new(); n],
            skipped: 0,
        };
        for row in lines.by_ref() {
            if row.is_empty() || row.starts_with(',') {
                break;
            }
            let fields: Vec<&str> = row.split(',').collect();
            if fields.len() < 3 {
                bail!("Malformed plan row: {row:?}");
            }
            let volume = state.volume_index(fields[0].trim())?;
            block.initial[volume] = resolve_sns(state, fields[1], &mut block.skipped)?;
            block.target[volume] = resolve_sns(state, fields[2], &mut block.skipped)?;
        }
        blocks.push(block);
    }
    Ok(blocks)
}

/// Recompute the cost of every block of a plan report, validation off.
pub(crate) fn replay_plan(
    path: &Path,
    state: &MigrationState,
    calculator: &CostCalculator<'_>,
    params: &CostParams,
) -> Result<Vec<(ReplayedBlock, CostResult)>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read plan {}", path.display()))?;
    let blocks = parse_plan(&contents, state)?;
    info!("Replaying {} plan blocks from {}", blocks.len(), path.display());

    let params = CostParams { validate: false, ..params.clone() };
    Ok(blocks
        .into_iter()
        .map(|block| {
            let cost = calculator.evaluate(state, CostInput::plan(&block.initial, &block.target), &params);
            (block, cost)
        })
        .collect())
}
