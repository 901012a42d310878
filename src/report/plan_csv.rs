use crate::cost::CostResult;
use crate::model::{FileCatalog, Mapping};
use crate::runner::ClusterTag;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BLOCK_HEADER: &str = "Server name, Iteration num, Iteration Max Traffic Bytes, WT, Gap, Seed, Eps, \
     Initial Internal Margin, Ensure load balance, Num attempts, Elapsed seconds";

pub(crate) const VOLUME_HEADER: &str = "Cluster path,Initial files,Final files,initial size B,initial size %,\
     received B,deleted B,traffic B, overlap traffic B, block reuse B, aborted traffic B,final size B,\
     final size %,total traffic B,total traffic%,total deletion B,total deletion%,lb_score,\
     is_valid_traffic, is_valid_lb,error_message";

const SUMMARY_HEADER: &str = "Summ traffic,Summ traffic%, Deletion B, Deletion %, Total Elapsed time seconds, \
     Sum chosen WT elapsed time, lb_score, is_valid_traffic, is_valid_lb";

/// One committed epoch, as it goes into the plan report.
pub(crate) struct PlanBlock<'a> {
    /// `<total>_m<migration>_c<change>`.
    pub label: &'a str,
    pub max_traffic: u64,
    pub tag: Option<ClusterTag>,
    /// Margin the epoch was planned with, in percent.
    pub margin: f64,
    pub elapsed: Duration,
    pub initial: &'a Mapping,
    pub target: &'a Mapping,
    pub cost: &'a CostResult,
}

/// Totals over every block of one report.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub traffic: u64,
    pub init_size: u64,
    pub final_size: u64,
    pub blocks: usize,
    pub planning: Duration,
    pub elapsed: Duration,
    pub lb_score: f64,
    pub traffic_valid: bool,
    pub lb_valid: bool,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            traffic: 0,
            init_size: 0,
            final_size: 0,
            blocks: 0,
            planning: Duration::ZERO,
            elapsed: Duration::ZERO,
            lb_score: 1.0,
            traffic_valid: true,
            lb_valid: true,
        }
    }

    fn record(&mut self, block: &PlanBlock<'_>) {
        if self.blocks == 0 {
            self.init_size = block.cost.init_system_size;
        }
        self.blocks += 1;
        self.traffic += block.cost.traffic;
        self.final_size = block.cost.final_system_size();
        self.planning += block.elapsed;
        self.lb_score = block.cost.lb_score;
        self.traffic_valid &= block.cost.traffic_valid;
        self.lb_valid &= block.cost.lb_valid;
    }

    /// Bytes reclaimed between the first block's start and the last one's
    /// end.
    pub(crate) fn deletion(&self) -> i64 {
        self.init_size as i64 - self.final_size as i64
    }

    pub(crate) fn traffic_pct(&self) -> f64 {
        pct(self.traffic as f64, self.init_size)
    }

    pub(crate) fn deletion_pct(&self) -> f64 {
        pct(self.deletion() as f64, self.init_size)
    }
}

fn pct(value: f64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    value * 100.0 / total as f64
}

const fn flag(value: bool) -> u8 {
    if value {
        1
    } else {
        0
    }
}

fn join_sns(catalog: &FileCatalog, files: &BTreeSet<usize>) -> String {
    files.iter().map(|&f| catalog.get(f).sn.to_string()).collect::<Vec<_>>().join("-")
}

/// Writer of `<prefix>_migration_plan.csv`.
pub(crate) struct PlanReport {
    path: PathBuf,
    server: String,
    writer: BufWriter<File>,
    summary: RunSummary,
    started: Instant,
}

impl PlanReport {
    pub(crate) fn create(path: &Path, server: impl Into<String>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            server: server.into(),
            writer: BufWriter::new(file),
            summary: RunSummary::new(),
            started: Instant::now(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write_block(&mut self, catalog: &FileCatalog, block: &PlanBlock<'_>) -> Result<()> {
        let w = &mut self.writer;
        let cost = block.cost;

        writeln!(w, "{BLOCK_HEADER}")?;
        let tag_fields = block.tag.map_or_else(
            || "-,-,-,-".to_string(),
            |t| format!("{},{},{},{}", t.wt, t.gap, t.seed, t.eps),
        );
        let attempts = block.tag.map_or_else(|| "-".to_string(), |t| t.attempts.to_string());
        writeln!(
            w,
            "{},{},{},{},{},1,{},{:.3}",
            self.server,
            block.label,
            block.max_traffic,
            tag_fields,
            block.margin,
            attempts,
            block.elapsed.as_secs_f64()
        )?;
        writeln!(w)?;

        writeln!(w, "{VOLUME_HEADER}")?;
        for (v, volume) in cost.volumes.iter().enumerate() {
            writeln!(
                w,
                "{},{},{},{},{:.4},{},{},{},{},{},{},{},{:.4}",
                cost.names[v],
                join_sns(catalog, &block.initial[v]),
                join_sns(catalog, &block.target[v]),
                volume.init_size,
                cost.init_pct(v),
                volume.received,
                volume.deleted,
                volume.traffic,
                volume.overlap_traffic,
                volume.block_reuse,
                volume.aborted_traffic,
                volume.final_size(),
                cost.final_pct(v)
            )?;
        }
        writeln!(
            w,
            ",,,,,,,,,,,,,{},{:.4},{},{:.4},{:.6},{},{},{}",
            cost.traffic,
            cost.traffic_pct(),
            cost.deletion_bytes(),
            cost.deletion_pct(),
            cost.lb_score,
            flag(cost.traffic_valid),
            flag(cost.lb_valid),
            cost.error_message
        )?;
        writeln!(w)?;

        self.summary.record(block);
        Ok(())
    }

    /// Append the summed results and flush.
    pub(crate) fn finish(mut self) -> Result<RunSummary> {
        self.summary.elapsed = self.started.elapsed();
        let s = &self.summary;
        let w = &mut self.writer;
        writeln!(w)?;
        writeln!(w, "Summed results:")?;
        writeln!(w, "{SUMMARY_HEADER}")?;
        writeln!(
            w,
            "{},{:.4},{},{:.4},{:.3},{:.3},{:.6},{},{}",
            s.traffic,
            s.traffic_pct(),
            s.deletion(),
            s.deletion_pct(),
            s.elapsed.as_secs_f64(),
            s.planning.as_secs_f64(),
            s.lb_score,
            flag(s.traffic_valid),
            flag(s.lb_valid)
        )?;
        w.flush().with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(self.summary)
    }
}
