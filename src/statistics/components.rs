//! Principal component decomposition of a data matrix via SVD.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fitted principal components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalComponents {
    /// `(n_components, n_features)`; each row is a unit-norm component.
    pub components: DMatrix<f64>,
    /// Variance explained by each component (`s^2 / (n - 1)`).
    pub explained_variance: Vec<f64>,
    /// Fraction of total variance explained by each component.
    pub explained_variance_ratio: Vec<f64>,
    /// Per-feature mean removed before decomposition.
    pub mean: DVector<f64>,
}

impl PrincipalComponents {
    /// Project `data` (`samples x features`) onto the components.
    pub fn transform(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(Error::ShapeMismatch {
                expected: (data.nrows(), self.mean.len()),
                found: data.shape(),
            });
        }
        let mut centered = data.clone();
        for mut row in centered.row_iter_mut() {
            row -= self.mean.transpose();
        }
        Ok(centered * self.components.transpose())
    }
}

/// Fit `n_components` principal components of `data` (`samples x features`).
///
/// # Errors
///
/// - [`Error::InsufficientData`] with fewer than two samples.
/// - [`Error::InvalidParameter`] if `n_components` is zero or exceeds
///   `min(samples, features)`.
pub fn principal_components(data: &DMatrix<f64>, n_components: usize) -> Result<PrincipalComponents> {
    let (n_samples, n_features) = data.shape();
    if n_samples < 2 {
        return Err(Error::InsufficientData {
            what: "principal components",
            got: n_samples,
            need: 2,
        });
    }
    let max_components = n_samples.min(n_features);
    if n_components == 0 || n_components > max_components {
        return Err(Error::InvalidParameter {
            name: "n_components",
            reason: format!("{n_components} is not in 1..={max_components}"),
        });
    }

    let mean = DVector::from_fn(n_features, |j, _| data.column(j).mean());
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        row -= mean.transpose();
    }

    let svd = centered.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| Error::InvalidParameter {
        name: "data",
        reason: "singular value decomposition did not converge".to_string(),
    })?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let denom = (n_samples - 1) as f64;
    let all_variance: Vec<f64> = order.iter().map(|&k| svd.singular_values[k].powi(2) / denom).collect();
    let total: f64 = all_variance.iter().sum();

    let components = DMatrix::from_fn(n_components, n_features, |c, j| v_t[(order[c], j)]);
    let explained_variance: Vec<f64> = all_variance[..n_components].to_vec();
    let explained_variance_ratio = explained_variance
        .iter()
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Ok(PrincipalComponents {
        components,
        explained_variance,
        explained_variance_ratio,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_one_data_has_single_component() {
        // Every sample lies on the line (1, 2, 2) * t
        let data = DMatrix::from_fn(6, 3, |i, j| {
            let t = i as f64 - 2.5;
            t * [1.0, 2.0, 2.0][j]
        });
        let pca = principal_components(&data, 2).unwrap();
        assert!((pca.explained_variance_ratio[0] - 1.0).abs() < 1e-10);
        assert!(pca.explained_variance_ratio[1].abs() < 1e-10);

        let c = pca.components.row(0);
        let expected = [1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0];
        let sign = c[0].signum();
        for j in 0..3 {
            assert!((c[j] * sign - expected[j]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_variance_sorted_descending() {
        let data = DMatrix::from_fn(10, 3, |i, j| ((i * 7 + j * 3) % 5) as f64 * (j + 1) as f64);
        let pca = principal_components(&data, 3).unwrap();
        for w in pca.explained_variance.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_transform_shape() {
        let data = DMatrix::from_fn(5, 4, |i, j| (i * j) as f64 + (i as f64).sin());
        let pca = principal_components(&data, 2).unwrap();
        let projected = pca.transform(&data).unwrap();
        assert_eq!(projected.shape(), (5, 2));
        assert!(pca.transform(&DMatrix::zeros(2, 3)).is_err());
    }

    #[test]
    fn test_invalid_component_count() {
        let data = DMatrix::from_element(4, 2, 1.0);
        assert!(principal_components(&data, 0).is_err());
        assert!(principal_components(&data, 3).is_err());
        assert!(principal_components(&DMatrix::from_element(1, 2, 1.0), 1).is_err());
    }
}
