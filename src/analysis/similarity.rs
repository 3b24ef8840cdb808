//! Similarity metrics between two maps of identical shape.

use std::collections::HashMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_shape, Error, Result};

/// Dice overlap of two maps binarized at `threshold` (`value > threshold`).
///
/// `2 |A ∩ B| / (|A| + |B|)`. Two empty binarizations are treated as a
/// perfect match (1.0). Inputs are not modified.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the maps differ in shape.
pub fn dice(map_a: &DMatrix<f64>, map_b: &DMatrix<f64>, threshold: f64) -> Result<f64> {
    ensure_same_shape(map_a.shape(), map_b.shape())?;

    let mut both = 0usize;
    let mut in_a = 0usize;
    let mut in_b = 0usize;
    for (&a, &b) in map_a.iter().zip(map_b.iter()) {
        let a = a > threshold;
        let b = b > threshold;
        in_a += a as usize;
        in_b += b as usize;
        both += (a && b) as usize;
    }

    if in_a + in_b == 0 {
        return Ok(1.0);
    }
    Ok(2.0 * both as f64 / (in_a + in_b) as f64)
}

/// Mutual information (nats) of the flattened maps from a `bins x bins`
/// joint histogram.
///
/// Each axis spans `[min, max]` of its finite values in `bins` equal-width
/// bins, the last one closed; a constant map uses `[v - 0.5, v + 0.5]`.
/// Pairs where either value is non-finite are skipped. The value is not
/// normalized; see [`entropy_normalized_mutual_information`].
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] if the maps differ in shape.
/// - [`Error::InvalidParameter`] if `bins` is zero.
pub fn normalized_mutual_information(
    map_a: &DMatrix<f64>,
    map_b: &DMatrix<f64>,
    bins: usize,
) -> Result<f64> {
    let histogram = JointHistogram::build(map_a, map_b, bins)?;
    Ok(histogram.mutual_information())
}

/// Mutual information divided by `sqrt(H(a) * H(b))`, in `[0, 1]`.
///
/// Returns 0 when either marginal entropy is 0.
///
/// # Errors
///
/// As [`normalized_mutual_information`].
pub fn entropy_normalized_mutual_information(
    map_a: &DMatrix<f64>,
    map_b: &DMatrix<f64>,
    bins: usize,
) -> Result<f64> {
    let histogram = JointHistogram::build(map_a, map_b, bins)?;
    Ok(histogram.normalized(histogram.mutual_information()))
}

/// All similarity metrics for one pair of maps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSimilarity {
    /// Dice overlap at the binarization threshold.
    pub dice: f64,
    /// Mutual information in nats.
    pub mutual_information: f64,
    /// Mutual information over `sqrt(H(a) * H(b))`.
    pub normalized_mutual_information: f64,
}

/// Compute every similarity metric between `map_a` and `map_b`.
///
/// # Errors
///
/// As [`normalized_mutual_information`].
pub fn compare_maps(
    map_a: &DMatrix<f64>,
    map_b: &DMatrix<f64>,
    dice_threshold: f64,
    bins: usize,
) -> Result<MapSimilarity> {
    let dice = dice(map_a, map_b, dice_threshold)?;
    let histogram = JointHistogram::build(map_a, map_b, bins)?;
    let mutual_information = histogram.mutual_information();
    let normalized_mutual_information = histogram.normalized(mutual_information);
    Ok(MapSimilarity {
        dice,
        mutual_information,
        normalized_mutual_information,
    })
}

/// Sparse joint histogram; at most one occupied cell per input pair.
struct JointHistogram {
    joint: HashMap<(usize, usize), usize>,
    marginal_a: Vec<usize>,
    marginal_b: HashMap<usize, usize>,
    total: usize,
}

impl JointHistogram {
    fn build(map_a: &DMatrix<f64>, map_b: &DMatrix<f64>, bins: usize) -> Result<Self> {
        ensure_same_shape(map_a.shape(), map_b.shape())?;
        if bins == 0 {
            return Err(Error::InvalidParameter {
                name: "bins",
                reason: "must be positive".to_string(),
            });
        }

        let pairs: Vec<(f64, f64)> = map_a
            .iter()
            .zip(map_b.iter())
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(&a, &b)| (a, b))
            .collect();

        let edges_a = BinEdges::spanning(pairs.iter().map(|p| p.0), bins);
        let edges_b = BinEdges::spanning(pairs.iter().map(|p| p.1), bins);

        let mut joint = HashMap::new();
        let mut marginal_a = vec![0usize; bins];
        let mut marginal_b = HashMap::new();
        for &(a, b) in &pairs {
            let ia = edges_a.index(a);
            let ib = edges_b.index(b);
            *joint.entry((ia, ib)).or_insert(0) += 1;
            marginal_a[ia] += 1;
            *marginal_b.entry(ib).or_insert(0) += 1;
        }

        Ok(Self {
            joint,
            marginal_a,
            marginal_b,
            total: pairs.len(),
        })
    }

    fn normalized(&self, mutual_information: f64) -> f64 {
        let hx = entropy(self.marginal_a.iter().copied(), self.total);
        let hy = entropy(self.marginal_b.values().copied(), self.total);
        if hx <= 0.0 || hy <= 0.0 {
            return 0.0;
        }
        (mutual_information / (hx * hy).sqrt()).clamp(0.0, 1.0)
    }

    fn mutual_information(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        self.joint
            .iter()
            .map(|(&(ia, ib), &count)| {
                let pxy = count as f64 / n;
                let px = self.marginal_a[ia] as f64 / n;
                let py = self.marginal_b[&ib] as f64 / n;
                pxy * (pxy / (px * py)).ln()
            })
            .sum::<f64>()
            .max(0.0)
    }
}

fn entropy(counts: impl Iterator<Item = usize>, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    -counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Uniform bin edges over a closed range.
struct BinEdges {
    lo: f64,
    width: f64,
    bins: usize,
}

impl BinEdges {
    fn spanning(values: impl Iterator<Item = f64>, bins: usize) -> Self {
        let (mut lo, mut hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo > hi {
            // No values
            lo = 0.0;
            hi = 1.0;
        } else if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        Self {
            lo,
            width: (hi - lo) / bins as f64,
            bins,
        }
    }

    fn index(&self, value: f64) -> usize {
        let i = ((value - self.lo) / self.width).floor();
        if i <= 0.0 {
            0
        } else {
            (i as usize).min(self.bins - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dice_identical_is_one() {
        let m = DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.5, 0.0]);
        assert_eq!(dice(&m, &m, 0.4).unwrap(), 1.0);
    }

    #[test]
    fn test_dice_partial_overlap() {
        let a = DMatrix::from_row_slice(1, 4, &[1.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(1, 4, &[1.0, 0.0, 1.0, 0.0]);
        assert!((dice(&a, &b, 0.5).unwrap() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_dice_both_empty_and_inputs_untouched() {
        let a = DMatrix::from_element(2, 2, 0.1);
        let b = DMatrix::from_element(2, 2, 0.2);
        assert_eq!(dice(&a, &b, 0.4).unwrap(), 1.0);
        assert_eq!(a[(0, 0)], 0.1);
        assert_eq!(b[(1, 1)], 0.2);
    }

    #[test]
    fn test_dice_threshold_is_strict() {
        let a = DMatrix::from_element(1, 1, 0.4);
        let b = DMatrix::from_element(1, 1, 0.9);
        assert_eq!(dice(&a, &b, 0.4).unwrap(), 0.0);
    }

    #[test]
    fn test_mutual_information_identical_equals_entropy() {
        // Four distinct, evenly spread values: MI = ln(4) with 4 bins.
        let m = DMatrix::from_row_slice(1, 4, &[0.0, 1.0, 2.0, 3.0]);
        let mi = normalized_mutual_information(&m, &m, 4).unwrap();
        assert!((mi - 4f64.ln()).abs() < 1e-12);
        let nmi = entropy_normalized_mutual_information(&m, &m, 4).unwrap();
        assert!((nmi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mutual_information_independent_is_zero() {
        let a = DMatrix::from_row_slice(1, 4, &[0.0, 0.0, 1.0, 1.0]);
        let b = DMatrix::from_row_slice(1, 4, &[0.0, 1.0, 0.0, 1.0]);
        let mi = normalized_mutual_information(&a, &b, 2).unwrap();
        assert!(mi.abs() < 1e-12);
    }

    #[test]
    fn test_constant_map_has_zero_normalized_information() {
        let a = DMatrix::from_element(3, 3, 0.7);
        let b = DMatrix::from_fn(3, 3, |i, j| (i + j) as f64);
        assert_eq!(entropy_normalized_mutual_information(&a, &b, 10).unwrap(), 0.0);
        assert!(normalized_mutual_information(&a, &b, 10).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_compare_maps_agrees_with_individual_metrics() {
        let a = DMatrix::from_fn(4, 4, |i, j| ((i * 4 + j) as f64 * 0.37).sin());
        let b = DMatrix::from_fn(4, 4, |i, j| ((i * 4 + j) as f64 * 0.41).cos());
        let all = compare_maps(&a, &b, 0.2, 8).unwrap();
        assert_eq!(all.dice, dice(&a, &b, 0.2).unwrap());
        assert_eq!(all.mutual_information, normalized_mutual_information(&a, &b, 8).unwrap());
        assert_eq!(
            all.normalized_mutual_information,
            entropy_normalized_mutual_information(&a, &b, 8).unwrap()
        );
    }

    #[test]
    fn test_shape_and_bin_checks() {
        let a = DMatrix::<f64>::zeros(2, 2);
        let b = DMatrix::<f64>::zeros(2, 3);
        assert!(matches!(dice(&a, &b, 0.0).unwrap_err(), Error::ShapeMismatch { .. }));
        assert!(normalized_mutual_information(&a, &a, 0).is_err());
    }
}
