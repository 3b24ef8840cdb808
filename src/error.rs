//! Error types for covariance analysis.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the reduction, correlation, and contrast stages.
///
/// Numeric degeneracies (zero-variance rows) are handled locally and never
/// reach this type; an empty cluster result is a normal value.
#[derive(Error, Debug)]
pub enum Error {
    /// Two cohorts produced region matrices with different region counts.
    #[error("region count mismatch: cohort A has {cohort_a} regions, cohort B has {cohort_b}")]
    RegionCountMismatch {
        /// Regions in the first cohort.
        cohort_a: usize,
        /// Regions in the second cohort.
        cohort_b: usize,
    },

    /// A correlation estimator name that is not recognised.
    #[error("unsupported correlation kind: {0:?} (expected pearson, spearman or ledoit)")]
    UnsupportedCorrelationKind(String),

    /// A pooling strategy name that is not recognised.
    #[error("unsupported pooling strategy: {0:?}")]
    UnsupportedPoolingStrategy(String),

    /// Volume, label image, or mask grids disagree.
    #[error("grid mismatch: expected {expected:?}, found {found:?}")]
    GridMismatch {
        /// Grid of the reference image.
        expected: (usize, usize, usize),
        /// Grid of the offending image.
        found: (usize, usize, usize),
    },

    /// Two matrices that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shape of the reference matrix.
        expected: (usize, usize),
        /// Shape of the offending matrix.
        found: (usize, usize),
    },

    /// A parcellation was used before `fit` was called.
    #[error("parcellation has not been fitted")]
    NotFitted,

    /// `fit` was called on a parcellation that is already fitted.
    #[error("parcellation is already fitted; region ordering is fixed")]
    AlreadyFitted,

    /// Not enough observations for the requested statistic.
    #[error("insufficient data for {what}: got {got}, need at least {need}")]
    InsufficientData {
        /// What was being computed.
        what: &'static str,
        /// Observations available.
        got: usize,
        /// Observations required.
        need: usize,
    },

    /// A parameter outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing or reading a persisted artifact failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialisation failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn ensure_same_shape(
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<()> {
    if expected != found {
        return Err(Error::ShapeMismatch { expected, found });
    }
    Ok(())
}
