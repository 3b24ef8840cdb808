//! Region-by-region correlation with significance testing.
//!
//! Rows of the input matrix are the variables; columns are observations.
//! The estimator is chosen with [`CorrelationKind`]:
//!
//! - Pearson: sample correlation, NaN replaced by 0, values at or above 0.999
//!   clamped to [`CORRELATION_SENTINEL`], two-sided t-test p-values
//! - Spearman: Pearson on average-tie ranks, rank-correlation p-values
//! - Ledoit: Ledoit–Wolf shrinkage correlation, no p-values

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};

use crate::config::CorrelationKind;
use crate::error::{Error, Result};
use crate::types::{CorrelationMatrix, PValueMatrix, RegionMatrix, CLAMP_THRESHOLD, CORRELATION_SENTINEL};

use super::ranks::average_ranks;
use super::shrinkage::ledoit_wolf_correlation;
use super::significance::{correlation_dof, pearson_p_values, spearman_p_values};

/// Correlation matrix and, where the estimator supports it, p-values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEstimate {
    /// Estimator used.
    pub kind: CorrelationKind,

    /// Square, symmetric `(regions, regions)` correlation matrix.
    pub correlation: CorrelationMatrix,

    /// Two-sided p-values, same indexing as `correlation`.
    /// `None` for [`CorrelationKind::Ledoit`].
    pub p_values: Option<PValueMatrix>,

    /// Observations (columns) per variable.
    pub n_observations: usize,

    /// Off-diagonal entries whose NaN correlation was replaced by 0.
    pub n_substituted: usize,

    /// Shrinkage intensity, for the Ledoit estimator.
    pub shrinkage: Option<f64>,
}

impl CorrelationEstimate {
    /// Number of regions (rows and columns of the correlation matrix).
    pub fn n_regions(&self) -> usize {
        self.correlation.nrows()
    }
}

/// Correlate the rows of `matrix` with the chosen estimator.
///
/// # Errors
///
/// - [`Error::InsufficientData`] if there are no regions or fewer than
///   three observations (no degrees of freedom for the t-test).
///
/// # Example
///
/// ```ignore
/// let estimate = correlate(&reduced, CorrelationKind::Pearson)?;
/// let p = estimate.p_values.as_ref().unwrap();
/// ```
pub fn correlate(matrix: &RegionMatrix, kind: CorrelationKind) -> Result<CorrelationEstimate> {
    let (n_regions, n_observations) = matrix.shape();
    if n_regions == 0 {
        return Err(Error::InsufficientData {
            what: "correlation regions",
            got: 0,
            need: 1,
        });
    }
    correlation_dof(n_observations)?;

    tracing::info!(kind = %kind, regions = n_regions, observations = n_observations, "computing sample correlation");

    let estimate = match kind {
        CorrelationKind::Pearson => {
            let (mut correlation, n_substituted) = pearson_matrix(matrix);
            clamp_near_unity(&mut correlation);
            correlation.fill_diagonal(CORRELATION_SENTINEL);
            let p_values = pearson_p_values(&correlation, n_observations)?;
            CorrelationEstimate {
                kind,
                correlation,
                p_values: Some(p_values),
                n_observations,
                n_substituted,
                shrinkage: None,
            }
        }
        CorrelationKind::Spearman => {
            let ranked = rank_rows(matrix);
            let (mut correlation, n_substituted) = pearson_matrix(&ranked);
            correlation.fill_diagonal(1.0);
            let p_values = spearman_p_values(&correlation, n_observations)?;
            CorrelationEstimate {
                kind,
                correlation,
                p_values: Some(p_values),
                n_observations,
                n_substituted,
                shrinkage: None,
            }
        }
        CorrelationKind::Ledoit => {
            let (mut correlation, shrinkage) = ledoit_wolf_correlation(matrix);
            let n_substituted = replace_nan(&mut correlation);
            correlation.fill_diagonal(1.0);
            CorrelationEstimate {
                kind,
                correlation,
                p_values: None,
                n_observations,
                n_substituted,
                shrinkage: Some(shrinkage),
            }
        }
    };

    if estimate.n_substituted > 0 {
        tracing::warn!(
            entries = estimate.n_substituted,
            "zero-variance regions produced undefined correlations; replaced with 0"
        );
    }

    Ok(estimate)
}

/// Raw Pearson correlation of the rows, clipped to `[-1, 1]`, with NaN
/// (zero-variance rows) replaced by 0.
///
/// Returns the matrix and the number of off-diagonal substitutions.
pub fn pearson_matrix(matrix: &RegionMatrix) -> (CorrelationMatrix, usize) {
    let n_regions = matrix.nrows();

    let mut centered = matrix.clone();
    for mut row in centered.row_iter_mut() {
        let mean = row.mean();
        row.add_scalar_mut(-mean);
    }
    let norms: Vec<f64> = centered.row_iter().map(|row| row.norm()).collect();

    let pair = |i: usize, j: usize| -> f64 {
        let r = centered.row(i).dot(&centered.row(j)) / (norms[i] * norms[j]);
        if r.is_nan() {
            r
        } else {
            r.clamp(-1.0, 1.0)
        }
    };

    let pairs: Vec<(usize, usize)> = (0..n_regions)
        .flat_map(|i| (i..n_regions).map(move |j| (i, j)))
        .collect();

    #[cfg(feature = "parallel")]
    let values: Vec<f64> = crate::thread_pool::install(|| pairs.par_iter().map(|&(i, j)| pair(i, j)).collect());

    #[cfg(not(feature = "parallel"))]
    let values: Vec<f64> = pairs.iter().map(|&(i, j)| pair(i, j)).collect();

    let mut correlation = CorrelationMatrix::zeros(n_regions, n_regions);
    for (&(i, j), &r) in pairs.iter().zip(values.iter()) {
        correlation[(i, j)] = r;
        correlation[(j, i)] = r;
    }

    let n_substituted = replace_nan(&mut correlation);
    (correlation, n_substituted)
}

/// Clamp every `r >= 0.999` to `0.999999`.
///
/// Negative correlations are left as computed; an exact `-1` yields an
/// infinite t statistic, which maps to p = 0.
pub fn clamp_near_unity(correlation: &mut CorrelationMatrix) {
    correlation.apply(|r| {
        if *r >= CLAMP_THRESHOLD {
            *r = CORRELATION_SENTINEL;
        }
    });
}

fn replace_nan(correlation: &mut CorrelationMatrix) -> usize {
    let mut off_diagonal = 0;
    let n = correlation.nrows();
    for i in 0..n {
        for j in 0..correlation.ncols() {
            let entry = &mut correlation[(i, j)];
            if entry.is_nan() {
                *entry = 0.0;
                if i != j {
                    off_diagonal += 1;
                }
            }
        }
    }
    off_diagonal
}

fn rank_rows(matrix: &RegionMatrix) -> RegionMatrix {
    let mut ranked = matrix.clone();
    for (i, row) in matrix.row_iter().enumerate() {
        let values: Vec<f64> = row.iter().copied().collect();
        for (t, rank) in average_ranks(&values).into_iter().enumerate() {
            ranked[(i, t)] = rank;
        }
    }
    ranked
}
