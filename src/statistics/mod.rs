//! Statistical estimators for region-level connectivity.
//!
//! This module provides the correlation engine and its supporting methods:
//! - Pearson, Spearman and Ledoit–Wolf correlation matrices
//! - Two-sided t-test significance for correlation coefficients
//! - Fractional ranking for rank correlation
//! - Principal component decomposition

mod components;
mod correlation;
mod ranks;
mod shrinkage;
mod significance;

pub use components::{principal_components, PrincipalComponents};
pub use correlation::{clamp_near_unity, correlate, pearson_matrix, CorrelationEstimate};
pub use ranks::average_ranks;
pub use shrinkage::{covariance_to_correlation, ledoit_wolf, ledoit_wolf_correlation, ShrinkageEstimate};
pub use significance::{
    correlation_dof, pearson_p_values, pearson_t_statistic, spearman_p_values, spearman_t_statistic,
    two_sided_p_value,
};
