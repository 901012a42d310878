use super::dissimilarity::DistanceWeights;
use super::matching::match_clusters;
use super::merge::{Clustering, MergeParams};
use super::ranking::{best_result, ResultKey};
use crate::cost::{CostInput, CostResult};
use crate::model::{Mapping, MigrationState};
use crate::runner::{ClusterTag, PlanOutcome, PlanRequest, Planner};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::info;

/// Parameter grid and tuning of the clustering engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClusterOptions {
    /// Traffic weights to try, in percent.
    pub wts: Vec<f64>,
    pub seeds: Vec<u64>,
    /// Gaps to try, in percent.
    pub gaps: Vec<f64>,
    /// Margin relaxation per failed attempt, in percent.
    pub eps: f64,
    pub max_attempts: usize,
    pub max_offers: usize,
    pub load_balance: bool,
    /// Desired volume shares in percent; empty means an even split.
    pub lb_sizes: Vec<f64>,
    pub use_new_dist_metric: bool,
    pub sort_order: Vec<ResultKey>,
}

/// Dendrogram-based mover: one clustering per (wt, seed, gap) combination,
/// plus the option of not moving anything, and the best by the result
/// comparator wins.
#[derive(Debug, Clone)]
pub(crate) struct HierarchicalClusterMover {
    options: ClusterOptions,
}

struct Candidate {
    tag: Option<ClusterTag>,
    target: Mapping,
    cost: CostResult,
}

impl HierarchicalClusterMover {
    pub(crate) fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    /// Desired shares, largest first, one per volume.
    pub(crate) fn arranged_lb_sizes(&self, num_volumes: usize) -> Vec<f64> {
        let mut sizes = if self.options.lb_sizes.is_empty() {
            vec![100.0 / num_volumes.max(1) as f64; num_volumes]
        } else {
            self.options.lb_sizes.clone()
        };
        sizes.sort_unstable_by(|a, b| b.total_cmp(a));
        sizes
    }
}

impl Planner for HierarchicalClusterMover {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn plan(&mut self, state: &MigrationState, request: &PlanRequest<'_>) -> Result<PlanOutcome> {
        let started = Instant::now();
        let opts = &self.options;
        let num_volumes = state.num_volumes();
        let initial = state.mapping();
        let lb_sizes = self.arranged_lb_sizes(num_volumes);
        let initial_size = state.total_size() as f64;
        let optimal_size = state.distinct_size() as f64;

        let mut clustering = Clustering::new(state);
        let mut candidates: Vec<Candidate> =
            Vec::with_capacity(opts.wts.len() * opts.seeds.len() * opts.gaps.len() + 1);

        for &wt in &opts.wts {
            let weight = wt / 100.0;
            for &seed in &opts.seeds {
                let mut rng = StdRng::seed_from_u64(seed);
                for &gap in &opts.gaps {
                    let params = MergeParams {
                        weights: DistanceWeights {
                            wt: weight,
                            num_volumes,
                            use_new_metric: opts.use_new_dist_metric,
                        },
                        gap,
                        max_offers: opts.max_offers,
                        load_balance: opts.load_balance,
                        lb_sizes: lb_sizes.clone(),
                        approx_size: initial_size - weight * (initial_size - optimal_size),
                    };

                    let report = clustering.run(
                        &params,
                        request.margin,
                        opts.eps,
                        opts.max_attempts,
                        num_volumes,
                        &mut rng,
                    )?;
                    let target = match_clusters(state, &initial, &clustering.clusters());
                    let cost = request.calculator.evaluate(
                        state,
                        CostInput::plan(&initial, &target),
                        request.params,
                    );
                    info!(
                        "Clustering wt={} seed={} gap={}: traffic={:.2}% deletion={:.2}% lb_score={:.4} attempts={}",
                        wt,
                        seed,
                        gap,
                        cost.traffic_pct(),
                        cost.deletion_pct(),
                        cost.lb_score,
                        report.attempts()
                    );
                    candidates.push(Candidate {
                        tag: Some(ClusterTag { wt, gap, seed, eps: opts.eps, attempts: report.attempts() }),
                        target,
                        cost,
                    });
                }
            }
        }

        let baseline = initial.clone();
        let cost = request.calculator.evaluate(state, CostInput::plan(&initial, &baseline), request.params);
        candidates.push(Candidate { tag: None, target: baseline, cost });

        let best = best_result(&opts.sort_order, candidates.iter().map(|c| &c.cost))
            .and_then(|i| candidates.into_iter().nth(i));
        let Some(best) = best else {
            bail!("No clustering result to choose from");
        };

        let label = match best.tag {
            Some(tag) => format!("cluster wt={} seed={} gap={}", tag.wt, tag.seed, tag.gap),
            None => "do nothing".to_string(),
        };
        info!(
            "Plan generated: {} (deletion {:.2}%, traffic {:.2}%)",
            label,
            best.cost.deletion_pct(),
            best.cost.traffic_pct()
        );

        Ok(PlanOutcome {
            target: best.target,
            steps: Vec::new(),
            tag: best.tag,
            label,
            elapsed: started.elapsed(),
        })
    }
}
