//! Multiple-comparisons correction policies applied to a p-value map.

use serde::{Deserialize, Serialize};

use super::cluster::{cluster_threshold, ClusterThreshold};
use super::fdr::{bonferroni_threshold, fdr_mask, fdr_threshold_from_slice, upper_triangle, FdrThreshold};
use crate::error::{Error, Result};
use crate::types::{n_region_pairs, PValueMatrix, SurvivorMask};

/// How to correct a p-value map for multiple comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Two-level cluster-extent thresholding.
    Cluster {
        /// Per-entry significance threshold.
        p_threshold: f64,
        /// Minimum surviving cluster size.
        min_cluster_size: usize,
    },
    /// Benjamini–Hochberg false discovery rate.
    Fdr {
        /// Target false discovery rate.
        alpha: f64,
        /// Comparisons to scale by; defaults to the number of region pairs.
        n_comparisons: Option<usize>,
    },
    /// Bonferroni family-wise correction.
    Bonferroni {
        /// Family-wise error rate.
        alpha: f64,
        /// Comparisons to scale by; defaults to the number of region pairs.
        n_comparisons: Option<usize>,
    },
}

/// Details specific to the correction method that was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CorrectionDetail {
    /// Cluster labels and sizes.
    Cluster(ClusterThreshold),
    /// Benjamini–Hochberg threshold.
    Fdr(FdrThreshold),
    /// Bonferroni per-comparison threshold.
    Bonferroni {
        /// `alpha / n_comparisons`.
        threshold: f64,
        /// Comparisons the threshold was scaled by.
        n_comparisons: usize,
    },
}

/// Result of applying a [`CorrectionPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// Entries declared significant.
    pub survivors: SurvivorMask,
    /// Method-specific outcome.
    pub detail: CorrectionDetail,
}

impl Correction {
    /// Number of entries declared significant.
    pub fn n_survivors(&self) -> usize {
        self.survivors.iter().filter(|&&s| s).count()
    }
}

/// Apply `policy` to `p_values`.
///
/// For the FDR and Bonferroni policies on a square map, only the strict
/// upper triangle is ranked and the diagonal never survives; the survivor
/// mask is kept symmetric.
///
/// # Errors
///
/// [`Error::InvalidParameter`] if a threshold or alpha is outside `(0, 1]`
/// or the number of comparisons resolves to zero.
pub fn correct(p_values: &PValueMatrix, policy: CorrectionPolicy) -> Result<Correction> {
    match policy {
        CorrectionPolicy::Cluster {
            p_threshold,
            min_cluster_size,
        } => {
            check_unit_interval("p_threshold", p_threshold)?;
            let clusters = cluster_threshold(p_values, p_threshold, min_cluster_size);
            Ok(Correction {
                survivors: clusters.survivors.clone(),
                detail: CorrectionDetail::Cluster(clusters),
            })
        }
        CorrectionPolicy::Fdr { alpha, n_comparisons } => {
            check_unit_interval("fdr_alpha", alpha)?;
            let n = resolve_comparisons(p_values, n_comparisons)?;
            let fdr = fdr_threshold_from_slice(&ranked_values(p_values), alpha, n);
            let survivors = clear_diagonal(fdr_mask(p_values, fdr.threshold));
            Ok(Correction {
                survivors,
                detail: CorrectionDetail::Fdr(fdr),
            })
        }
        CorrectionPolicy::Bonferroni { alpha, n_comparisons } => {
            check_unit_interval("alpha", alpha)?;
            let n = resolve_comparisons(p_values, n_comparisons)?;
            let threshold = bonferroni_threshold(alpha, n);
            let survivors = clear_diagonal(p_values.map(|p| p <= threshold));
            Ok(Correction {
                survivors,
                detail: CorrectionDetail::Bonferroni {
                    threshold,
                    n_comparisons: n,
                },
            })
        }
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            reason: format!("{value} is not in (0, 1]"),
        })
    }
}

fn is_square(p_values: &PValueMatrix) -> bool {
    p_values.nrows() == p_values.ncols()
}

fn ranked_values(p_values: &PValueMatrix) -> Vec<f64> {
    if is_square(p_values) {
        upper_triangle(p_values)
    } else {
        p_values.as_slice().to_vec()
    }
}

fn resolve_comparisons(p_values: &PValueMatrix, n_comparisons: Option<usize>) -> Result<usize> {
    let n = n_comparisons.unwrap_or_else(|| {
        if is_square(p_values) {
            n_region_pairs(p_values.nrows())
        } else {
            p_values.len()
        }
    });
    if n == 0 {
        return Err(Error::InvalidParameter {
            name: "n_comparisons",
            reason: "no comparisons to correct over".to_string(),
        });
    }
    Ok(n)
}

fn clear_diagonal(mut mask: SurvivorMask) -> SurvivorMask {
    if mask.nrows() == mask.ncols() {
        mask.fill_diagonal(false);
    }
    mask
}
