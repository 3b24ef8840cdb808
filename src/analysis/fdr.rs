//! False discovery rate (Benjamini–Hochberg) and Bonferroni thresholds.

use serde::{Deserialize, Serialize};

use crate::types::{PValueMatrix, SurvivorMask};

/// Benjamini–Hochberg threshold and the number of ranks that passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FdrThreshold {
    /// Critical value `k * alpha / n` of the largest passing rank, or 0.
    pub threshold: f64,
    /// Largest passing rank `k` (0 when nothing passes).
    pub n_passed: usize,
    /// Target false discovery rate.
    pub alpha: f64,
    /// Number of comparisons the critical values were scaled by.
    pub n_comparisons: usize,
}

/// Benjamini–Hochberg threshold over every entry of `p_values`.
///
/// See [`fdr_threshold_from_slice`].
pub fn fdr_threshold(p_values: &PValueMatrix, alpha: f64, n_comparisons: usize) -> FdrThreshold {
    fdr_threshold_from_slice(p_values.as_slice(), alpha, n_comparisons)
}

/// Benjamini–Hochberg threshold.
///
/// P-values are sorted ascending and compared against the critical values
/// `k_i = i * alpha / n_comparisons` for ranks `i = 1..=n_comparisons`
/// (only the first `min(len, n_comparisons)` sorted values are ranked).
/// The threshold is `k_i` at the largest rank with `p_(i) < k_i`, or 0 if
/// no rank qualifies. Declare significant every p-value `<=` the threshold.
///
/// # Panics
///
/// Panics if `n_comparisons` is 0 or `alpha` is not in `(0, 1]`.
pub fn fdr_threshold_from_slice(p_values: &[f64], alpha: f64, n_comparisons: usize) -> FdrThreshold {
    assert!(n_comparisons > 0, "n_comparisons must be positive");
    assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1]");

    let mut sorted = p_values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = n_comparisons as f64;
    let n_passed = sorted
        .iter()
        .take(n_comparisons)
        .enumerate()
        .filter(|&(i, &p)| p < (i + 1) as f64 * alpha / n)
        .map(|(i, _)| i + 1)
        .max()
        .unwrap_or(0);

    let threshold = n_passed as f64 * alpha / n;
    tracing::info!(passed = n_passed, threshold, "{} tests passed FDR thresholding", n_passed);

    FdrThreshold {
        threshold,
        n_passed,
        alpha,
        n_comparisons,
    }
}

/// Entries at or below `threshold`. A zero threshold selects nothing.
pub fn fdr_mask(p_values: &PValueMatrix, threshold: f64) -> SurvivorMask {
    p_values.map(|p| threshold > 0.0 && p <= threshold)
}

/// Bonferroni per-comparison threshold `alpha / n_comparisons`.
///
/// # Panics
///
/// Panics if `n_comparisons` is 0.
pub fn bonferroni_threshold(alpha: f64, n_comparisons: usize) -> f64 {
    assert!(n_comparisons > 0, "n_comparisons must be positive");
    alpha / n_comparisons as f64
}

/// Strict upper triangle of a square matrix, row by row.
pub fn upper_triangle(p_values: &PValueMatrix) -> Vec<f64> {
    let n = p_values.nrows().min(p_values.ncols());
    let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..p_values.ncols() {
            values.push(p_values[(i, j)]);
        }
    }
    values
}
