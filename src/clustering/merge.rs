use super::dissimilarity::{distance, DissimilarityMatrix, DistanceWeights};
use super::node::ClusterNode;
use crate::error::PlanError;
use crate::model::MigrationState;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

/// A candidate merge: `absorbed` is folded into `kept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MergeOffer {
    pub distance: f64,
    pub kept: usize,
    pub absorbed: usize,
}

impl MergeOffer {
    fn sort_key(&self) -> (f64, usize, usize) {
        (self.distance, self.kept, self.absorbed)
    }

    fn precedes(&self, other: &Self) -> bool {
        let (a, b) = (self.sort_key(), other.sort_key());
        a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)).is_lt()
    }
}

/// Everything one dendrogram build depends on besides the margin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MergeParams {
    pub weights: DistanceWeights,
    /// Offers within `gap` percent of the best one are equally eligible.
    pub gap: f64,
    pub max_offers: usize,
    pub load_balance: bool,
    /// Desired cluster shares in percent, largest first.
    pub lb_sizes: Vec<f64>,
    /// Expected system size once the plan is applied.
    pub approx_size: f64,
}

/// Margin of attempt `k` (0-based): the first two attempts use the base
/// margin, every later one relaxes it by another `eps` percent.
pub(crate) fn attempt_margin(margin: f64, eps: f64, attempt: usize) -> f64 {
    let exponent = attempt.saturating_sub(1);
    margin * (1.0 + eps / 100.0).powi(i32::try_from(exponent).unwrap_or(i32::MAX))
}

/// Result of a successful attempt loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttemptReport {
    /// Margins tried, in order; the last one succeeded.
    pub margins: Vec<f64>,
}

impl AttemptReport {
    pub(crate) fn attempts(&self) -> usize {
        self.margins.len()
    }
}

/// Agglomerative clustering over the files of one state, one cluster per
/// live file to start with.
pub(crate) struct Clustering<'s> {
    state: &'s MigrationState,
    nodes: Vec<ClusterNode>,
    matrix: DissimilarityMatrix,
}

impl<'s> Clustering<'s> {
    pub(crate) fn new(state: &'s MigrationState) -> Self {
        let nodes: Vec<ClusterNode> =
            (0..state.catalog.len()).map(|f| ClusterNode::seed(state, f)).collect();
        let sizes: Vec<u64> = nodes.iter().map(ClusterNode::size).collect();
        let matrix = DissimilarityMatrix::build(state, &sizes);
        Self { state, nodes, matrix }
    }

    fn reset(&mut self) {
        self.matrix.reset();
        for node in &mut self.nodes {
            node.reset(self.state);
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_active()).count()
    }

    /// Current clusters, ordered by their slot.
    pub(crate) fn clusters(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_active()).collect()
    }

    /// Would the merge keep every projected cluster below its share plus
    /// margin? Sizes and shares are compared largest to largest.
    fn is_valid_merge(&self, kept: usize, absorbed: usize, margin: f64, params: &MergeParams) -> bool {
        let mut sizes: Vec<u64> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|&(i, n)| i != kept && i != absorbed && n.is_active())
            .map(|(_, n)| n.size())
            .collect();
        sizes.push(self.nodes[kept].merged_size(&self.nodes[absorbed], self.state));
        sizes.sort_unstable_by(|a, b| b.cmp(a));

        sizes
            .iter()
            .zip(&params.lb_sizes)
            .all(|(&size, &share)| size as f64 <= (share + margin) / 100.0 * params.approx_size)
    }

    /// Collect the `max_offers` closest eligible pairs and pick one of those
    /// within `gap` of the closest at random.
    pub(crate) fn find_best_merge(
        &self,
        params: &MergeParams,
        margin: f64,
        rng: &mut StdRng,
    ) -> Option<MergeOffer> {
        let mut offers: Vec<MergeOffer> = Vec::with_capacity(params.max_offers + 1);

        for kept in 0..self.matrix.len() {
            for absorbed in 0..kept {
                let Some(d) = distance(self.matrix.cell(kept, absorbed), &params.weights) else {
                    continue;
                };
                if offers.len() >= params.max_offers && offers.last().is_some_and(|worst| d >= worst.distance) {
                    continue;
                }
                if params.load_balance && !self.is_valid_merge(kept, absorbed, margin, params) {
                    continue;
                }

                let offer = MergeOffer { distance: d, kept, absorbed };
                if offers.len() >= params.max_offers {
                    offers.pop();
                }
                let at = offers.iter().position(|o| offer.precedes(o)).unwrap_or(offers.len());
                offers.insert(at, offer);
            }
        }

        let best = offers.first()?;
        let limit = best.distance * (1.0 + params.gap / 100.0);
        let mut max_index = offers.len() - 1;
        while max_index >= 1 && offers[max_index].distance > limit {
            max_index -= 1;
        }
        Some(offers[rng.gen_range(0..=max_index)])
    }

    fn merge(&mut self, offer: MergeOffer) {
        self.matrix.link(offer.kept, offer.absorbed);
        let absorbed = self.nodes[offer.absorbed].clone();
        self.nodes[offer.kept].absorb(&absorbed, self.state);
        self.nodes[offer.absorbed].disable();
        self.matrix.deactivate(offer.absorbed);
    }

    /// Merge down to `target` clusters under `margin`. False when no
    /// eligible pair is left before that.
    pub(crate) fn attempt(
        &mut self,
        params: &MergeParams,
        margin: f64,
        target: usize,
        rng: &mut StdRng,
    ) -> bool {
        self.reset();
        let mut current = self.active_count();
        while current > target {
            let Some(offer) = self.find_best_merge(params, margin, rng) else {
                return false;
            };
            self.merge(offer);
            current -= 1;
        }
        true
    }

    /// Attempt loop relaxing the margin geometrically until a dendrogram
    /// with `target` clusters is built.
    pub(crate) fn run(
        &mut self,
        params: &MergeParams,
        margin: f64,
        eps: f64,
        max_attempts: usize,
        target: usize,
        rng: &mut StdRng,
    ) -> Result<AttemptReport, PlanError> {
        let mut margins = Vec::new();
        for k in 0..max_attempts {
            let relaxed = attempt_margin(margin, eps, k);
            margins.push(relaxed);
            if self.attempt(params, relaxed, target, rng) {
                debug!("Clustering reached {} clusters at margin {:.4}", target, relaxed);
                return Ok(AttemptReport { margins });
            }
            info!("Clustering attempt {} failed at margin {:.4}", k + 1, relaxed);
        }
        Err(PlanError::MarginNotReached {
            attempts: max_attempts,
            margin: margins.last().copied().unwrap_or(margin),
        })
    }
}
