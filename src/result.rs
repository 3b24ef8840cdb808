//! Result records for a group covariance analysis.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::{correct, ClusterThreshold, Correction, CorrectionPolicy, PermutationResult};
use crate::config::CorrelationKind;
use crate::error::Result;
use crate::statistics::CorrelationEstimate;
use crate::types::{CorrelationMatrix, DifferenceMap, PValueMatrix, RegionMatrix};

/// Everything computed for one cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortResult {
    /// Cohort name, used in persisted file names.
    pub label: String,

    /// Region-by-observation matrix the correlation was computed from.
    pub reduced: RegionMatrix,

    /// Sample size used in the Fisher z contrast.
    pub sample_size: usize,

    /// Correlation (and p-values, where supported).
    pub estimate: CorrelationEstimate,

    /// Cluster-extent thresholding of the p-values, when the estimator
    /// produces them.
    pub clusters: Option<ClusterThreshold>,
}

impl CohortResult {
    /// Region-by-region correlation matrix.
    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.estimate.correlation
    }

    /// P-values, `None` for estimators without a significance test.
    pub fn p_values(&self) -> Option<&PValueMatrix> {
        self.estimate.p_values.as_ref()
    }

    /// Observations per region.
    pub fn n_observations(&self) -> usize {
        self.estimate.n_observations
    }

    /// Apply a multiple-comparisons policy to this cohort's p-values.
    ///
    /// Returns `Ok(None)` when the estimator produced no p-values.
    pub fn correct(&self, policy: CorrectionPolicy) -> Result<Option<Correction>> {
        self.p_values().map(|p| correct(p, policy)).transpose()
    }

    /// Condensed view for reporting.
    pub fn summary(&self) -> CohortSummary {
        let r = self.correlation();
        let n = r.nrows();
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                sum += r[(i, j)];
                count += 1;
            }
        }
        CohortSummary {
            label: self.label.clone(),
            n_observations: self.n_observations(),
            sample_size: self.sample_size,
            n_substituted: self.estimate.n_substituted,
            shrinkage: self.estimate.shrinkage,
            mean_correlation: if count > 0 { sum / count as f64 } else { 0.0 },
            n_clusters: self.clusters.as_ref().map(|c| c.n_clusters),
            n_significant: self.clusters.as_ref().map(ClusterThreshold::n_survivors),
        }
    }
}

/// Outcome of a two-cohort analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResult {
    /// First cohort (minuend of the contrast).
    pub cohort_a: CohortResult,

    /// Second cohort (subtrahend of the contrast).
    pub cohort_b: CohortResult,

    /// Fisher z difference `A - B`.
    pub difference: DifferenceMap,

    /// Permutation max-statistic test, when requested.
    pub permutation: Option<PermutationResult>,

    /// Run metadata.
    pub metadata: Metadata,
}

impl GroupResult {
    /// Number of regions shared by both cohorts.
    pub fn n_regions(&self) -> usize {
        self.difference.nrows()
    }

    /// Largest `|z|` in the difference map off the diagonal.
    pub fn max_abs_difference(&self) -> f64 {
        let n = self.difference.nrows();
        let mut max = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                max = max.max(self.difference[(i, j)].abs());
            }
        }
        max
    }

    /// Condensed view for reporting and JSON export.
    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            n_regions: self.n_regions(),
            cohort_a: self.cohort_a.summary(),
            cohort_b: self.cohort_b.summary(),
            max_abs_difference: self.max_abs_difference(),
            permutation: self.permutation.as_ref().map(|p| PermutationSummary {
                n_permutations: p.n_permutations,
                seed: p.seed,
                n_significant_pairs: count_upper(&p.corrected_p, |v| v < 0.05),
            }),
            metadata: self.metadata.clone(),
        }
    }
}

fn count_upper(matrix: &PValueMatrix, predicate: impl Fn(f64) -> bool) -> usize {
    let n = matrix.nrows();
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .filter(|&(i, j)| predicate(matrix[(i, j)]))
        .count()
}

/// Metadata recorded for every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Correlation estimator.
    pub kind: CorrelationKind,

    /// Whether region means were removed per observation before correlating.
    pub detrend: bool,

    /// Parcellation labels in region (row) order.
    pub region_labels: Vec<u32>,

    /// Prefix of persisted file names.
    pub output_prefix: String,

    /// Files written by the run, in order.
    pub saved: Vec<PathBuf>,

    /// Wall-clock runtime in seconds.
    pub runtime_secs: f64,
}

/// Per-cohort figures for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    /// Cohort name.
    pub label: String,
    /// Observations per region.
    pub n_observations: usize,
    /// Sample size of the contrast.
    pub sample_size: usize,
    /// Correlations replaced by 0 because a region had no variance.
    pub n_substituted: usize,
    /// Ledoit–Wolf shrinkage intensity, when applicable.
    pub shrinkage: Option<f64>,
    /// Mean off-diagonal correlation.
    pub mean_correlation: f64,
    /// Surviving clusters, when p-values exist.
    pub n_clusters: Option<usize>,
    /// Entries inside surviving clusters, when p-values exist.
    pub n_significant: Option<usize>,
}

/// Permutation test figures for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationSummary {
    /// Permutations drawn.
    pub n_permutations: usize,
    /// Base seed.
    pub seed: u64,
    /// Region pairs with FWER-corrected p below 0.05.
    pub n_significant_pairs: usize,
}

/// Serializable overview of a [`GroupResult`] without the full matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Regions per cohort.
    pub n_regions: usize,
    /// First cohort.
    pub cohort_a: CohortSummary,
    /// Second cohort.
    pub cohort_b: CohortSummary,
    /// Largest off-diagonal `|z|` of the contrast.
    pub max_abs_difference: f64,
    /// Permutation test, when run.
    pub permutation: Option<PermutationSummary>,
    /// Run metadata.
    pub metadata: Metadata,
}
