use crate::changes::InsertPolicy;
use crate::config::PlannerConfig;
use crate::runner::ChangePosition;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Deduplication-aware migration planner.
#[derive(Parser, Debug)]
#[command(name = "dedup-planner", version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Plan with the greedy single-file mover.
    Greedy(GreedyArgs),
    /// Plan with hierarchical clustering.
    Cluster(ClusterArgs),
    /// Recompute the cost of a written migration plan.
    Replay(ReplayArgs),
}

impl Command {
    pub(crate) fn common(&self) -> &CommonArgs {
        match self {
            Self::Greedy(args) => &args.common,
            Self::Cluster(args) => &args.common,
            Self::Replay(args) => &args.common,
        }
    }
}

fn parse_change_pos(s: &str) -> Result<ChangePosition, String> {
    ChangePosition::try_from(s)
}

fn parse_insert_type(s: &str) -> Result<InsertPolicy, String> {
    InsertPolicy::try_from(s)
}

#[derive(Args, Debug)]
pub(crate) struct CommonArgs {
    /// Volume list: one `<workload path>, <a|s|t>, <fraction>` per line.
    #[arg(long)]
    pub volumes: PathBuf,

    /// Traffic budget of a run, in percent of the initial system size.
    #[arg(long, default_value_t = 20.0)]
    pub traffic: f64,

    /// Per-volume balance margin, in percent.
    #[arg(long)]
    pub margin: Option<f64>,

    /// Migration iterations per run.
    #[arg(long, default_value_t = 1)]
    pub iterations: usize,

    /// Change iterations per run.
    #[arg(long, default_value_t = 0)]
    pub change_iterations: usize,

    /// Change file with `add:<path>,del:<path>` lines.
    #[arg(long)]
    pub changes: Option<PathBuf>,

    /// Number of changes per run, in percent of the initial file count.
    #[arg(long, default_value_t = 0.0)]
    pub changes_perc: f64,

    #[arg(long, default_value_t = 22)]
    pub changes_seed: u64,

    #[arg(long, default_value = "migration_with_continuous_changes", value_parser = parse_change_pos)]
    pub change_pos: ChangePosition,

    #[arg(long, default_value = "random", value_parser = parse_insert_type)]
    pub insert_type: InsertPolicy,

    /// JSON index of the snapshots per user and host.
    #[arg(long)]
    pub files_index: Option<PathBuf>,

    /// Repeat the whole schedule this many times.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    #[arg(long)]
    pub output_prefix: Option<String>,

    /// Compute every cost directly.
    #[arg(long)]
    pub no_cache: bool,

    /// SQLite cost cache, or `memory` for a process-local one.
    #[arg(long)]
    pub cache_path: Option<String>,

    /// Configuration file.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub split_sort_order: Option<String>,

    #[arg(long)]
    pub carry_traffic: bool,

    #[arg(long)]
    pub converge_margin: bool,
}

impl CommonArgs {
    /// Explicit flags win over the config file.
    pub(crate) fn apply(&self, config: &mut PlannerConfig) {
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if let Some(prefix) = &self.output_prefix {
            config.output_prefix.clone_from(prefix);
        }
        if self.no_cache {
            config.use_cache = false;
        }
        if let Some(path) = &self.cache_path {
            config.cache_path.clone_from(path);
        }
        if let Some(order) = &self.split_sort_order {
            config.split_sort_order.clone_from(order);
        }
        config.carry_traffic |= self.carry_traffic;
        config.converge_margin |= self.converge_margin;
    }
}

#[derive(Args, Debug)]
pub(crate) struct GreedyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Multiplier on the iteration budget.
    #[arg(long)]
    pub traffic_handicap: Option<f64>,

    /// Wall-clock budget of one iteration, in seconds.
    #[arg(long)]
    pub time_limit_secs: Option<u64>,
}

impl GreedyArgs {
    pub(crate) fn apply(&self, config: &mut PlannerConfig) {
        self.common.apply(config);
        if let Some(handicap) = self.traffic_handicap {
            config.traffic_handicap = handicap;
        }
        if let Some(secs) = self.time_limit_secs {
            config.time_limit_secs = secs;
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ClusterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Traffic weights to try, in percent.
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub wt: Vec<f64>,

    /// Seeds to try.
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub seed: Vec<u64>,

    /// Merge offer gaps to try, in percent.
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub gap: Vec<f64>,

    /// Keep clusters within their share plus margin while merging.
    #[arg(long)]
    pub lb: bool,

    /// Desired cluster shares in percent; defaults to an even split.
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub lb_sizes: Vec<f64>,

    #[arg(long)]
    pub eps: Option<f64>,

    #[arg(long)]
    pub max_attempts: Option<usize>,

    #[arg(long)]
    pub max_offers: Option<usize>,

    #[arg(long)]
    pub use_new_dist_metric: bool,

    /// Result comparator keys, e.g. `traffic_valid lb_valid deletion`.
    #[arg(long)]
    pub result_sort_order: Option<String>,
}

impl ClusterArgs {
    pub(crate) fn apply(&self, config: &mut PlannerConfig) {
        self.common.apply(config);
        if let Some(eps) = self.eps {
            config.eps = eps;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(offers) = self.max_offers {
            config.max_offers = offers;
        }
        config.use_new_dist_metric |= self.use_new_dist_metric;
        if let Some(order) = &self.result_sort_order {
            config.result_sort_order.clone_from(order);
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Migration plan CSV to recompute.
    #[arg(long)]
    pub plan: PathBuf,
}
