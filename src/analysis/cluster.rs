//! Cluster-extent thresholding over a p-value grid.
//!
//! Two-level test: an entry survives only if its own p-value is below the
//! threshold and it belongs to a 4-connected cluster of such entries that
//! is at least `min_cluster_size` large.

use serde::{Deserialize, Serialize};

use crate::types::{ClusterLabelMap, PValueMatrix, SurvivorMask};

/// Outcome of cluster-extent thresholding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterThreshold {
    /// True where an entry passes both the p-value and cluster-size tests.
    pub survivors: SurvivorMask,
    /// Surviving cluster index per entry (`1..=n_clusters`), 0 elsewhere.
    pub labels: ClusterLabelMap,
    /// Number of surviving clusters.
    pub n_clusters: usize,
    /// Clusters found before the size test.
    pub n_candidate_clusters: usize,
    /// Size of each surviving cluster, indexed by `label - 1`.
    pub cluster_sizes: Vec<usize>,
}

impl ClusterThreshold {
    /// Number of surviving entries.
    pub fn n_survivors(&self) -> usize {
        self.cluster_sizes.iter().sum()
    }
}

/// Threshold `p_values` at `p_threshold`, then drop clusters smaller than
/// `min_cluster_size`.
///
/// Candidates are entries with `0 < p < p_threshold`; exact zeros (e.g. the
/// sentinel diagonal) never seed a cluster. A map with no candidates yields
/// zero clusters.
///
/// # Panics
///
/// Panics if `p_threshold` is NaN.
pub fn cluster_threshold(p_values: &PValueMatrix, p_threshold: f64, min_cluster_size: usize) -> ClusterThreshold {
    assert!(!p_threshold.is_nan(), "p_threshold must not be NaN");

    let candidates = p_values.map(|p| p > 0.0 && p < p_threshold);
    let (labels, n_candidate_clusters) = label_components(&candidates);

    let mut sizes = vec![0usize; n_candidate_clusters + 1];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    // Relabel survivors densely as 1..=n_clusters in scan order.
    let mut remap = vec![0usize; n_candidate_clusters + 1];
    let mut cluster_sizes = Vec::new();
    for label in 1..=n_candidate_clusters {
        if sizes[label] >= min_cluster_size {
            cluster_sizes.push(sizes[label]);
            remap[label] = cluster_sizes.len();
        }
    }
    let n_clusters = cluster_sizes.len();

    let labels = labels.map(|label| remap[label]);
    let survivors = labels.map(|label| label > 0);

    tracing::info!(
        clusters = n_clusters,
        discarded = n_candidate_clusters - n_clusters,
        "{:03} clusters were found during two-level thresholding",
        n_clusters
    );

    ClusterThreshold {
        survivors,
        labels,
        n_clusters,
        n_candidate_clusters,
        cluster_sizes,
    }
}

/// Label 4-connected components of `mask` (row/column neighbours).
///
/// Labels run from 1 in row-major order of each component's first entry;
/// 0 marks entries outside the mask.
pub fn label_components(mask: &SurvivorMask) -> (ClusterLabelMap, usize) {
    let (rows, cols) = mask.shape();
    let mut labels = ClusterLabelMap::zeros(rows, cols);
    let mut next = 0;
    let mut stack = Vec::new();

    for i in 0..rows {
        for j in 0..cols {
            if !mask[(i, j)] || labels[(i, j)] != 0 {
                continue;
            }
            next += 1;
            labels[(i, j)] = next;
            stack.push((i, j));
            while let Some((r, c)) = stack.pop() {
                let neighbours = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && mask[(nr, nc)] && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = next;
                        stack.push((nr, nc));
                    }
                }
            }
        }
    }

    (labels, next)
}
