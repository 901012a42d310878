use anyhow::{ensure, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

mod cache;
mod changes;
mod cli;
mod clustering;
mod config;
mod cost;
mod db;
mod error;
mod greedy;
mod model;
mod report;
mod runner;
mod split;
mod workload;

#[cfg(test)]
mod tests;

use cache::{CostCache, MemoryCache, SqliteCache};
use changes::{batch_sizes, ChangeApplicator, ChangeStream};
use cli::{Cli, Command, CommonArgs};
use clustering::{parse_sort_order, ClusterOptions, HierarchicalClusterMover};
use config::{LogFormat, PlannerConfig};
use greedy::{GreedyMover, GreedyOptions};
use model::{MigrationState, StateOptions};
use runner::{Planner, RunSettings, Runner};
use split::SplitOrder;

/// Cost cache selected by the configuration.
enum CacheBackend {
    Memory(MemoryCache),
    Sqlite(SqliteCache),
}

impl CacheBackend {
    fn open(config: &PlannerConfig) -> Option<Self> {
        if !config.use_cache {
            return None;
        }
        if config.cache_path == "memory" {
            return Some(Self::Memory(MemoryCache::new()));
        }
        let sleep = Duration::from_millis(config.lock_sleep_ms);
        match SqliteCache::open(Path::new(&config.cache_path), config.lock_attempts, sleep) {
            Ok(cache) => Some(Self::Sqlite(cache)),
            Err(e) => {
                warn!("Cost cache at {} unavailable, computing directly: {:#}", config.cache_path, e);
                None
            }
        }
    }

    fn as_dyn(&self) -> &dyn CostCache {
        match self {
            Self::Memory(cache) => cache,
            Self::Sqlite(cache) => cache,
        }
    }

    fn log_size(&self) {
        match self {
            Self::Memory(cache) => info!("Cost cache holds {} records", cache.len()),
            Self::Sqlite(cache) => {
                if let Some(count) = cache.stored() {
                    info!("Cost cache holds {} records", count);
                }
            }
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dedup_planner=info".into());
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn load(common: &CommonArgs, config: &PlannerConfig) -> Result<MigrationState> {
    let volumes = workload::load_volume_list(&common.volumes)?;
    let options = StateOptions { strict_removals: config.strict_removals, filter_blocks: config.filter_blocks };
    let mut state = workload::load_state(volumes, options)?;
    if let Some(path) = &common.files_index {
        state.host_history = workload::load_files_index(path)?;
        info!("Files index loaded: {} hosts", state.host_history.len());
    }
    Ok(state)
}

/// Change batches for every run, read from one change file in order.
fn change_applicator(common: &CommonArgs, state: &MigrationState) -> Result<Option<ChangeApplicator>> {
    if common.change_iterations == 0 {
        return Ok(None);
    }
    let Some(path) = &common.changes else {
        anyhow::bail!("--change-iterations needs a --changes file");
    };
    let per_run = batch_sizes(state.catalog.len(), common.changes_perc, common.change_iterations);
    let batches: Vec<usize> = per_run.iter().copied().cycle().take(per_run.len() * common.runs.max(1)).collect();
    info!("Change batches per run: {:?}", per_run);
    let stream = ChangeStream::open(path)?;
    Ok(Some(ChangeApplicator::new(stream, common.insert_type, common.changes_seed, batches)))
}

fn settings(common: &CommonArgs, config: &PlannerConfig) -> Result<RunSettings> {
    ensure!(common.traffic >= 0.0, "--traffic must be >= 0");
    ensure!(common.runs >= 1, "--runs must be >= 1");
    Ok(RunSettings {
        traffic_pct: common.traffic,
        margin: config.margin,
        iterations: common.iterations,
        change_iterations: common.change_iterations,
        runs: common.runs,
        change_pos: common.change_pos,
        carry_traffic: config.carry_traffic,
        converge_margin: config.converge_margin,
        split_order: SplitOrder::try_from(config.split_sort_order.as_str()).map_err(anyhow::Error::msg)?,
        load_balance: true,
        desired_pct: Vec::new(),
        output_prefix: config.output_prefix.clone(),
        cache_scope: common
            .changes
            .as_ref()
            .map_or_else(|| "static".to_string(), |p| p.display().to_string()),
        transfer_log: false,
    })
}

fn run(command: &Command, config: &PlannerConfig) -> Result<()> {
    let common = command.common();
    let mut state = load(common, config)?;
    let mut settings = settings(common, config)?;
    let cache = CacheBackend::open(config);
    let cache_ref = cache.as_ref().map(CacheBackend::as_dyn);

    let planner: Box<dyn Planner> = match command {
        Command::Greedy(_) => {
            settings.desired_pct = state.desired().iter().map(|d| d * 100.0).collect();
            settings.transfer_log = true;
            Box::new(GreedyMover::new(GreedyOptions {
                traffic_handicap: config.traffic_handicap,
                time_limit: Duration::from_secs(config.time_limit_secs),
            }))
        }
        Command::Cluster(args) => {
            settings.load_balance = args.lb;
            settings.desired_pct.clone_from(&args.lb_sizes);
            Box::new(HierarchicalClusterMover::new(ClusterOptions {
                wts: args.wt.clone(),
                seeds: args.seed.clone(),
                gaps: args.gap.clone(),
                eps: config.eps,
                max_attempts: config.max_attempts,
                max_offers: config.max_offers,
                load_balance: args.lb,
                lb_sizes: args.lb_sizes.clone(),
                use_new_dist_metric: config.use_new_dist_metric,
                sort_order: parse_sort_order(&config.result_sort_order)?,
            }))
        }
        Command::Replay(args) => {
            settings.desired_pct = state.desired().iter().map(|d| d * 100.0).collect();
            runner::replay(&state, &args.plan, &settings, cache_ref)?;
            if let Some(cache) = &cache {
                cache.log_size();
            }
            return Ok(());
        }
    };

    let changes = change_applicator(common, &state)?;
    let mut runner = Runner::new(planner, settings, cache_ref, changes);
    let summaries = runner.run(&mut state)?;
    for (i, summary) in summaries.iter().enumerate() {
        info!(
            "Run {}: {} epochs, traffic {} bytes ({:.2}%), deletion {} bytes ({:.2}%), valid traffic={} lb={}",
            i + 1,
            summary.blocks,
            summary.traffic,
            summary.traffic_pct(),
            summary.deletion(),
            summary.deletion_pct(),
            summary.traffic_valid,
            summary.lb_valid
        );
    }
    if let Some(cache) = &cache {
        cache.log_size();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PlannerConfig::load(cli.command.common().config.as_deref())?;
    match &cli.command {
        Command::Greedy(args) => args.apply(&mut config),
        Command::Cluster(args) => args.apply(&mut config),
        Command::Replay(args) => args.common.apply(&mut config),
    }
    init_tracing(config.log_format);
    config.validate()?;

    info!("dedup-planner v{} starting up", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: margin={}%, cache={}, output_prefix={}",
        config.margin,
        if config.use_cache { config.cache_path.as_str() } else { "off" },
        config.output_prefix
    );

    if let Err(e) = run(&cli.command, &config) {
        error!("{:#}", e);
        return Err(e);
    }
    info!("dedup-planner finished");
    Ok(())
}
