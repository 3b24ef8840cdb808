//! # covmap
//!
//! Group-level functional covariance maps from parcellated neuroimaging data.
//!
//! This crate reduces voxel-level volume series to region-by-observation
//! matrices with a fitted label parcellation, correlates the regions within
//! each cohort, and contrasts two cohorts, outputting:
//! - Per-cohort correlation matrices (Pearson, Spearman or Ledoit–Wolf)
//! - Two-sided p-values where the estimator supports them
//! - A Fisher z difference map between the cohorts
//! - Multiple-comparisons corrections (cluster extent, FDR, Bonferroni,
//!   permutation max-statistic)
//! - Similarity metrics between maps (Dice, mutual information)
//!
//! ## Quick Start
//!
//! ```ignore
//! use covmap::{Cohort, GroupCovariance, LabelParcellation, NpyStore};
//!
//! let mut scheme = LabelParcellation::new(atlas, Some(mask));
//! scheme.fit()?;
//!
//! let mut store = NpyStore::new("outputs");
//! let result = GroupCovariance::new()
//!     .output_prefix("aal_")
//!     .run(&Cohort::new("bd", bd_volumes), &Cohort::new("hc", hc_volumes), &scheme, &mut store)?;
//!
//! println!("{}", covmap::output::format_result(&result.summary()));
//! ```
//!
//! The individual stages are also available on their own:
//!
//! ```ignore
//! use covmap::{correlate, difference, CorrelationKind};
//!
//! let a = correlate(&reduced_a, CorrelationKind::Pearson)?;
//! let b = correlate(&reduced_b, CorrelationKind::Pearson)?;
//! let z = difference(&a.correlation, &b.correlation, a.n_observations, b.n_observations)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod pipeline;
mod result;
mod thread_pool;
mod types;

// Functional modules
pub mod analysis;
pub mod output;
pub mod parcellation;
pub mod statistics;
pub mod storage;

// Re-exports for public API
pub use analysis::{
    cluster_threshold, compare_maps, correct, dice, difference, fdr_threshold, normalized_mutual_information,
    permutation_test, ClusterThreshold, Correction, CorrectionPolicy, FdrThreshold, MapSimilarity, PermutationResult,
};
pub use config::{Config, CorrelationKind, PoolingStrategy};
pub use error::{Error, Result};
pub use parcellation::{reduce, LabelImage, LabelParcellation, Mask, Parcellator, Volume, VolumeSeries};
pub use pipeline::{Cohort, GroupCovariance};
pub use result::{CohortResult, CohortSummary, GroupResult, GroupSummary, Metadata, PermutationSummary};
pub use statistics::{correlate, CorrelationEstimate};
pub use storage::{ArrayStore, MemoryStore, NdArray, NpyStore};
pub use types::{
    n_region_pairs, ClusterLabelMap, CorrelationMatrix, DifferenceMap, PValueMatrix, RegionMatrix, SurvivorMask,
    CLAMP_THRESHOLD, CORRELATION_SENTINEL, DEFAULT_MI_BINS,
};
