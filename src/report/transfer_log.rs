use crate::model::MigrationState;
use crate::runner::PlanStep;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: &str = "Iteration,Source,Target,File SN,Replicated B,Deleted B,Moved B,Traffic B,\
     Total traffic B,Elapsed seconds,Phase";

/// Writer of `<prefix>_transfers.csv`: one row per move a step-wise engine
/// applied.
pub(crate) struct TransferLog {
    writer: BufWriter<File>,
    rows: usize,
}

impl TransferLog {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{HEADER}")?;
        Ok(Self { writer, rows: 0 })
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn write_steps(&mut self, label: &str, state: &MigrationState, steps: &[PlanStep]) -> Result<()> {
        for step in steps {
            let t = &step.transfer;
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{:.3},{}",
                label,
                state.volumes[t.source].name,
                state.volumes[t.target].name,
                t.file_sn,
                t.replicated,
                t.deleted,
                t.moved,
                t.traffic,
                step.total_traffic,
                step.elapsed.as_secs_f64(),
                step.phase.as_str()
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush transfer log")
    }
}
