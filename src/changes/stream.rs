use crate::error::PlanError;
use crate::workload::parse_snapshot_path;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::warn;

/// One `add:<path>,del:<path>` record. Either side may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChangeLine {
    pub add: Option<String>,
    pub del: Option<String>,
}

impl ChangeLine {
    /// Input id of the file to remove, from its snapshot base name.
    pub(crate) fn removed_input_id(&self) -> Option<String> {
        self.del.as_deref().and_then(parse_snapshot_path).map(|s| s.input_id)
    }
}

pub(crate) fn parse_change_line(line: &str) -> Result<ChangeLine, PlanError> {
    let line = line.trim_end_matches('\r');
    let malformed = || PlanError::MalformedChange { line: line.to_string() };

    let (add_part, del_part) = line.split_once(',').ok_or_else(malformed)?;
    let add = add_part.trim().strip_prefix("add:").ok_or_else(malformed)?;
    let del = del_part.trim().strip_prefix("del:").ok_or_else(malformed)?;

    let non_empty = |p: &str| {
        let p = p.trim();
        (!p.is_empty()).then(|| p.to_string())
    };
    Ok(ChangeLine { add: non_empty(add), del: non_empty(del) })
}

/// Split `round(perc * num_files / 100)` changes over `iterations`
/// batches, handing the remainder out one per batch from the first.
pub(crate) fn batch_sizes(num_files: usize, perc: f64, iterations: usize) -> Vec<usize> {
    if iterations == 0 {
        return Vec::new();
    }
    let total = (perc * num_files as f64 / 100.0).round().max(0.0) as usize;
    let base = total / iterations;
    let mut left = total % iterations;
    (0..iterations)
        .map(|_| {
            if left > 0 {
                left -= 1;
                base + 1
            } else {
                base
            }
        })
        .collect()
}

/// Sequential reader over a change file.
pub(crate) struct ChangeStream {
    lines: Lines<BufReader<File>>,
    path: String,
}

impl ChangeStream {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open changes file: {}", path.display()))?;
        Ok(Self { lines: BufReader::new(file).lines(), path: path.display().to_string() })
    }

    /// Read up to `count` change records. Malformed lines are logged and
    /// skipped without counting toward the batch.
    pub(crate) fn next_batch(&mut self, count: usize) -> Result<Vec<ChangeLine>> {
        let mut batch = Vec::with_capacity(count);
        while batch.len() < count {
            let Some(line) = self.lines.next() else {
                break;
            };
            let line = line.with_context(|| format!("Failed to read {}", self.path))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_change_line(&line) {
                Ok(change) => batch.push(change),
                Err(e) => warn!("Skipping change in {}: {}", self.path, e),
            }
        }
        Ok(batch)
    }
}
