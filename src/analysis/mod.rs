//! Group-level analysis of cohort correlation maps.
//!
//! This module implements the stages that follow correlation:
//!
//! 1. **Contrast** ([`contrast`]): Fisher z difference between two cohorts
//! 2. **Cluster thresholding** ([`cluster`]): two-level cluster-extent correction
//! 3. **FDR** ([`fdr`]): Benjamini–Hochberg and Bonferroni thresholds
//! 4. **Correction policies** ([`correction`]): one entry point for all of the above
//! 5. **Permutation test** ([`permutation`]): max-statistic FWER control
//! 6. **Similarity** ([`similarity`]): Dice overlap and mutual information between maps

pub mod cluster;
pub mod contrast;
pub mod correction;
pub mod fdr;
pub mod permutation;
pub mod similarity;

pub use cluster::{cluster_threshold, label_components, ClusterThreshold};
pub use contrast::{difference, fisher_z};
pub use correction::{correct, Correction, CorrectionDetail, CorrectionPolicy};
pub use fdr::{bonferroni_threshold, fdr_mask, fdr_threshold, fdr_threshold_from_slice, upper_triangle, FdrThreshold};
pub use permutation::{counter_rng_seed, permutation_test, PermutationResult, DEFAULT_PERMUTATION_SEED};
pub use similarity::{
    compare_maps, dice, entropy_normalized_mutual_information, normalized_mutual_information, MapSimilarity,
};
