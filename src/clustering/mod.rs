mod dissimilarity;
mod matching;
mod merge;
mod mover;
mod node;
mod ranking;

pub(crate) use mover::{ClusterOptions, HierarchicalClusterMover};
pub(crate) use ranking::{parse_sort_order, ResultKey};

#[cfg(test)]
pub(crate) use dissimilarity::{distance, jaccard_distance, physical_distance, DissimilarityCell, DistanceWeights};
#[cfg(test)]
pub(crate) use matching::{find_max, match_clusters};
#[cfg(test)]
pub(crate) use merge::{attempt_margin, Clustering, MergeParams};
#[cfg(test)]
pub(crate) use ranking::{best_result, compare_results};
