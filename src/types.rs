//! Type aliases and common types.

use nalgebra::DMatrix;

/// Region-by-timepoint signal matrix produced by parcellation.
///
/// Rows follow the ascending label order of the fitted parcellation;
/// columns are volumes (timepoints, or subjects for cohort concatenations).
pub type RegionMatrix = DMatrix<f64>;

/// Square, symmetric region-by-region correlation matrix.
pub type CorrelationMatrix = DMatrix<f64>;

/// Per-pair significance values, indexed identically to a [`CorrelationMatrix`].
pub type PValueMatrix = DMatrix<f64>;

/// Per-pair z-scores contrasting two cohorts.
pub type DifferenceMap = DMatrix<f64>;

/// Connected-cluster labels; 0 means "not part of a surviving cluster".
pub type ClusterLabelMap = DMatrix<usize>;

/// Entries that survive a multiple-comparisons correction.
pub type SurvivorMask = DMatrix<bool>;

/// Value placed on the Pearson diagonal and on clamped near-unity
/// correlations so the t statistic stays finite.
pub const CORRELATION_SENTINEL: f64 = 0.999_999;

/// Positive correlations at or above this value are clamped to
/// [`CORRELATION_SENTINEL`] before significance testing.
pub const CLAMP_THRESHOLD: f64 = 0.999;

/// Default bin count for the joint histogram in mutual-information metrics.
pub const DEFAULT_MI_BINS: usize = 5000;

/// Number of distinct unordered region pairs (upper triangle, no diagonal).
pub fn n_region_pairs(regions: usize) -> usize {
    regions * regions.saturating_sub(1) / 2
}
