//! Ledoit–Wolf shrinkage covariance.
//!
//! The sample covariance is shrunk towards a scaled identity `mu * I`,
//! with the intensity chosen analytically (Ledoit & Wolf, 2004):
//!
//! ```text
//! S     = X^T X / n                      (X centred, n x p)
//! mu    = tr(S) / p
//! delta = ||S - mu I||_F^2 / p
//! beta  = min(delta, (sum((X∘X)^T (X∘X)) / n - ||X^T X||_F^2 / n^2) / (p n))
//! shrinkage = beta / delta
//! Σ     = (1 - shrinkage) S + shrinkage mu I
//! ```

use nalgebra::DMatrix;

use crate::types::{CorrelationMatrix, RegionMatrix};

/// Shrunk covariance and the intensity that produced it.
#[derive(Debug, Clone)]
pub struct ShrinkageEstimate {
    /// `(variables, variables)` covariance.
    pub covariance: DMatrix<f64>,
    /// Shrinkage intensity in `[0, 1]`.
    pub shrinkage: f64,
}

/// Ledoit–Wolf covariance of the rows of `data` (variables x observations).
pub fn ledoit_wolf(data: &RegionMatrix) -> ShrinkageEstimate {
    let (p, n) = data.shape();
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        let mean = row.mean();
        row.add_scalar_mut(-mean);
    }

    let n_f = n as f64;
    let p_f = p as f64;
    let gram = &centered * centered.transpose();
    let sample_cov = &gram / n_f;

    if p <= 1 || n == 0 {
        return ShrinkageEstimate {
            covariance: sample_cov,
            shrinkage: 0.0,
        };
    }

    let mu = sample_cov.trace() / p_f;

    let squared = centered.map(|v| v * v);
    let beta_sum = (&squared * squared.transpose()).sum();
    let delta_sum = gram.iter().map(|v| v * v).sum::<f64>() / (n_f * n_f);

    let beta = (beta_sum / n_f - delta_sum) / (p_f * n_f);
    let delta = (delta_sum - 2.0 * mu * sample_cov.trace() + p_f * mu * mu) / p_f;
    let beta = beta.min(delta);
    let shrinkage = if beta == 0.0 { 0.0 } else { (beta / delta).clamp(0.0, 1.0) };

    let mut covariance = sample_cov * (1.0 - shrinkage);
    for i in 0..p {
        covariance[(i, i)] += shrinkage * mu;
    }

    ShrinkageEstimate { covariance, shrinkage }
}

/// Rows are scaled to unit norm, shrunk with [`ledoit_wolf`], then
/// converted to correlation. Zero-variance rows are left unscaled and yield
/// NaN entries that the caller replaces.
pub fn ledoit_wolf_correlation(data: &RegionMatrix) -> (CorrelationMatrix, f64) {
    let mut standardized = data.clone();
    for mut row in standardized.row_iter_mut() {
        let mean = row.mean();
        row.add_scalar_mut(-mean);
        let norm = row.norm();
        if norm > f64::EPSILON {
            row /= norm;
        }
    }

    let estimate = ledoit_wolf(&standardized);
    (covariance_to_correlation(&estimate.covariance), estimate.shrinkage)
}

/// `C_ij / sqrt(C_ii C_jj)`.
pub fn covariance_to_correlation(covariance: &DMatrix<f64>) -> CorrelationMatrix {
    let inv_sd: Vec<f64> = covariance.diagonal().iter().map(|v| 1.0 / v.sqrt()).collect();
    CorrelationMatrix::from_fn(covariance.nrows(), covariance.ncols(), |i, j| {
        covariance[(i, j)] * inv_sd[i] * inv_sd[j]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn noise(rows: usize, cols: usize, seed: u64) -> RegionMatrix {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        RegionMatrix::from_fn(rows, cols, |_, _| normal.sample(&mut rng))
    }

    #[test]
    fn test_shrinkage_in_unit_interval() {
        let est = ledoit_wolf(&noise(10, 15, 42));
        assert!((0.0..=1.0).contains(&est.shrinkage), "shrinkage = {}", est.shrinkage);
        assert!(est.shrinkage > 0.0);
    }

    #[test]
    fn test_shrunk_correlations_are_smaller() {
        let data = noise(8, 12, 1);
        let (shrunk, _) = ledoit_wolf_correlation(&data);
        let (raw, _) = crate::statistics::correlation::pearson_matrix(&data);
        let off = |m: &CorrelationMatrix| {
            let mut s = 0.0;
            for i in 0..8 {
                for j in 0..8 {
                    if i != j {
                        s += m[(i, j)].abs();
                    }
                }
            }
            s
        };
        assert!(off(&shrunk) <= off(&raw) + 1e-12);
    }

    #[test]
    fn test_trace_is_preserved() {
        let data = noise(5, 40, 3);
        let est = ledoit_wolf(&data);
        let mut centered = data.clone();
        for mut row in centered.row_iter_mut() {
            let mean = row.mean();
            row.add_scalar_mut(-mean);
        }
        let sample = &centered * centered.transpose() / 40.0;
        assert!((est.covariance.trace() - sample.trace()).abs() < 1e-10);
    }

    #[test]
    fn test_single_variable_has_no_shrinkage() {
        let est = ledoit_wolf(&noise(1, 20, 9));
        assert_eq!(est.shrinkage, 0.0);
    }

    #[test]
    fn test_covariance_to_correlation_unit_diagonal() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 9.0]);
        let corr = covariance_to_correlation(&cov);
        assert!((corr[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((corr[(1, 1)] - 1.0).abs() < 1e-12);
        assert!((corr[(0, 1)] - 1.0 / 3.0).abs() < 1e-12);
    }
}
