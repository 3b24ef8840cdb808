//! Permutation max-statistic test for the cohort contrast.
//!
//! Columns of the two region matrices are pooled and randomly reassigned to
//! cohorts of the original sizes. Each permutation recomputes the Pearson
//! difference map and keeps its largest `|z|` over region pairs; comparing
//! the observed map against this null distribution controls the
//! family-wise error rate across all pairs at once.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::contrast::difference;
use crate::error::{Error, Result};
use crate::statistics::{clamp_near_unity, pearson_matrix};
use crate::types::{CorrelationMatrix, DifferenceMap, PValueMatrix, RegionMatrix};

/// Default base seed when none is configured.
pub const DEFAULT_PERMUTATION_SEED: u64 = 0x5EED_C0DE;

/// Outcome of [`permutation_test`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationResult {
    /// Observed difference map (cohort A minus cohort B).
    pub observed: DifferenceMap,
    /// Maximum `|z|` over region pairs for each permutation, in order.
    pub null_max: Vec<f64>,
    /// FWER-corrected p-value per entry; 1 on the diagonal.
    pub corrected_p: PValueMatrix,
    /// Number of permutations drawn.
    pub n_permutations: usize,
    /// Base seed the per-permutation generators were derived from.
    pub seed: u64,
}

/// Counter-based RNG seed generation using SplitMix64.
///
/// Gives every permutation an independent, reproducible stream regardless
/// of which worker thread runs it.
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Run `n_permutations` label permutations of the cohort contrast.
///
/// Both matrices are `regions x observations`; the observation counts are
/// the sample sizes of the contrast. The result is identical for a given
/// `seed` with or without the `parallel` feature.
///
/// # Errors
///
/// - [`Error::RegionCountMismatch`] if the region counts differ.
/// - [`Error::InsufficientData`] if either cohort has fewer than 3 observations.
/// - [`Error::InvalidParameter`] if `n_permutations` is zero.
pub fn permutation_test(
    cohort_a: &RegionMatrix,
    cohort_b: &RegionMatrix,
    n_permutations: usize,
    seed: u64,
) -> Result<PermutationResult> {
    if cohort_a.nrows() != cohort_b.nrows() {
        return Err(Error::RegionCountMismatch {
            cohort_a: cohort_a.nrows(),
            cohort_b: cohort_b.nrows(),
        });
    }
    for n in [cohort_a.ncols(), cohort_b.ncols()] {
        if n < 3 {
            return Err(Error::InsufficientData {
                what: "permutation test observations",
                got: n,
                need: 3,
            });
        }
    }
    if n_permutations == 0 {
        return Err(Error::InvalidParameter {
            name: "n_permutations",
            reason: "must be positive".to_string(),
        });
    }

    let n_a = cohort_a.ncols();
    let n_b = cohort_b.ncols();
    let n_regions = cohort_a.nrows();
    let pooled = RegionMatrix::from_fn(n_regions, n_a + n_b, |r, c| {
        if c < n_a {
            cohort_a[(r, c)]
        } else {
            cohort_b[(r, c - n_a)]
        }
    });

    let observed = contrast(&pooled, &(0..n_a + n_b).collect::<Vec<_>>(), n_a)?;

    let draw = |k: usize| -> Result<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, k as u64));
        let mut order: Vec<usize> = (0..n_a + n_b).collect();
        order.shuffle(&mut rng);
        Ok(max_off_diagonal(&contrast(&pooled, &order, n_a)?))
    };

    #[cfg(feature = "parallel")]
    let null_max: Vec<f64> =
        crate::thread_pool::install(|| (0..n_permutations).into_par_iter().map(draw).collect::<Result<_>>())?;

    #[cfg(not(feature = "parallel"))]
    let null_max: Vec<f64> = (0..n_permutations).map(draw).collect::<Result<_>>()?;

    let denom = (n_permutations + 1) as f64;
    let corrected_p = PValueMatrix::from_fn(n_regions, n_regions, |i, j| {
        if i == j {
            return 1.0;
        }
        let z = observed[(i, j)].abs();
        let exceed = null_max.iter().filter(|&&m| m >= z).count();
        (1 + exceed) as f64 / denom
    });

    tracing::info!(
        permutations = n_permutations,
        seed,
        "permutation null distribution complete"
    );

    Ok(PermutationResult {
        observed,
        null_max,
        corrected_p,
        n_permutations,
        seed,
    })
}

/// Difference map with the first `n_a` columns of `order` as cohort A.
fn contrast(pooled: &RegionMatrix, order: &[usize], n_a: usize) -> Result<DifferenceMap> {
    let a = pooled.select_columns(&order[..n_a]);
    let b = pooled.select_columns(&order[n_a..]);
    let map_a = clamped_pearson(&a);
    let map_b = clamped_pearson(&b);
    difference(&map_a, &map_b, a.ncols(), b.ncols())
}

fn clamped_pearson(matrix: &RegionMatrix) -> CorrelationMatrix {
    let (mut correlation, _) = pearson_matrix(matrix);
    clamp_near_unity(&mut correlation);
    correlation
}

fn max_off_diagonal(map: &DifferenceMap) -> f64 {
    let mut max = 0.0f64;
    for i in 0..map.nrows() {
        for j in (i + 1)..map.ncols() {
            max = max.max(map[(i, j)].abs());
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn noise(rows: usize, cols: usize, seed: u64) -> RegionMatrix {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        RegionMatrix::from_fn(rows, cols, |_, _| normal.sample(&mut rng))
    }

    #[test]
    fn test_counter_rng_seed_distinct() {
        let seeds: Vec<u64> = (0..100).map(|k| counter_rng_seed(42, k)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
        assert_eq!(counter_rng_seed(42, 7), counter_rng_seed(42, 7));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = noise(4, 12, 1);
        let b = noise(4, 15, 2);
        let first = permutation_test(&a, &b, 50, 9).unwrap();
        let second = permutation_test(&a, &b, 50, 9).unwrap();
        assert_eq!(first.null_max, second.null_max);
        assert_eq!(first.corrected_p, second.corrected_p);
    }

    #[test]
    fn test_corrected_p_bounds() {
        let a = noise(5, 10, 3);
        let b = noise(5, 10, 4);
        let result = permutation_test(&a, &b, 99, 11).unwrap();
        assert_eq!(result.null_max.len(), 99);
        for i in 0..5 {
            assert_eq!(result.corrected_p[(i, i)], 1.0);
            for j in 0..5 {
                let p = result.corrected_p[(i, j)];
                assert!(p >= 1.0 / 100.0 && p <= 1.0);
            }
        }
    }

    #[test]
    fn test_strong_difference_is_detected() {
        // Regions 0 and 1 share a signal in cohort A only.
        let mut a = noise(3, 40, 5);
        let shared: Vec<f64> = a.row(0).iter().copied().collect();
        for (c, v) in shared.into_iter().enumerate() {
            a[(1, c)] = v + 0.05 * a[(1, c)];
        }
        let b = noise(3, 40, 6);
        let result = permutation_test(&a, &b, 200, 13).unwrap();
        assert!(result.corrected_p[(0, 1)] < 0.05);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let a = noise(3, 10, 7);
        assert!(matches!(
            permutation_test(&a, &noise(4, 10, 8), 10, 0).unwrap_err(),
            Error::RegionCountMismatch { .. }
        ));
        assert!(matches!(
            permutation_test(&a, &noise(3, 2, 8), 10, 0).unwrap_err(),
            Error::InsufficientData { .. }
        ));
        assert!(permutation_test(&a, &a, 0, 0).is_err());
    }
}
