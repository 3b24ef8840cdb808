//! Configuration for covariance analysis.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::CorrectionPolicy;
use crate::error::{Error, Result};
use crate::parcellation::{LabelImage, LabelParcellation, Mask};
use crate::storage::NpyStore;
use crate::types::DEFAULT_MI_BINS;

/// Configuration options for [`GroupCovariance`](crate::GroupCovariance)
/// and the correction stages that follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Correlation estimator (default: Pearson).
    pub kind: CorrelationKind,

    /// How voxels inside a region are pooled (default: mean).
    pub pooling: PoolingStrategy,

    /// Subtract the across-region mean at each timepoint before correlating.
    pub detrend: bool,

    /// Directory that receives persisted arrays.
    pub output_dir: PathBuf,

    /// Prefix prepended to every persisted artifact name.
    pub output_prefix: String,

    /// Voxel-level p threshold for cluster-extent thresholding (default: 0.001).
    pub p_threshold: f64,

    /// Minimum cluster size kept by cluster-extent thresholding (default: 1).
    pub min_cluster_size: usize,

    /// Target false discovery rate (default: 0.05).
    pub fdr_alpha: f64,

    /// Histogram bins for mutual information (default: 5000).
    pub mi_bins: usize,

    /// Binarisation threshold for Dice overlap (default: 0.4).
    pub dice_threshold: f64,

    /// Permutations for the max-statistic test; 0 disables it.
    pub n_permutations: usize,

    /// Optional deterministic seed for permutation testing.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kind: CorrelationKind::Pearson,
            pooling: PoolingStrategy::Mean,
            detrend: false,
            output_dir: PathBuf::from("."),
            output_prefix: String::new(),
            p_threshold: 0.001,
            min_cluster_size: 1,
            fdr_alpha: 0.05,
            mi_bins: DEFAULT_MI_BINS,
            dice_threshold: 0.4,
            n_permutations: 0,
            seed: None,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `COVMAP_*` environment variables on the current values.
    ///
    /// Unparseable values are reported rather than ignored.
    pub fn from_env(mut self) -> Result<Self> {
        if let Some(raw) = read_env("COVMAP_KIND") {
            self.kind = raw.parse()?;
        }
        if let Some(raw) = read_env("COVMAP_POOLING") {
            self.pooling = raw.parse()?;
        }
        if let Some(raw) = read_env("COVMAP_DETREND") {
            self.detrend = parse_bool(&raw)
                .ok_or_else(|| Error::Config(format!("COVMAP_DETREND={raw:?} is not a boolean")))?;
        }
        if let Some(raw) = read_env("COVMAP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = read_env("COVMAP_PREFIX") {
            self.output_prefix = raw;
        }
        if let Some(v) = parse_env("COVMAP_P_THRESHOLD")? {
            self.p_threshold = v;
        }
        if let Some(v) = parse_env("COVMAP_MIN_CLUSTER_SIZE")? {
            self.min_cluster_size = v;
        }
        if let Some(v) = parse_env("COVMAP_FDR_ALPHA")? {
            self.fdr_alpha = v;
        }
        if let Some(v) = parse_env("COVMAP_PERMUTATIONS")? {
            self.n_permutations = v;
        }
        if let Some(v) = parse_env("COVMAP_SEED")? {
            self.seed = Some(v);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every numeric option lies in its valid range.
    pub fn validate(&self) -> Result<()> {
        if !(self.p_threshold > 0.0 && self.p_threshold <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "p_threshold",
                reason: format!("{} is not in (0, 1]", self.p_threshold),
            });
        }
        if !(self.fdr_alpha > 0.0 && self.fdr_alpha <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "fdr_alpha",
                reason: format!("{} is not in (0, 1]", self.fdr_alpha),
            });
        }
        if self.min_cluster_size == 0 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mi_bins == 0 {
            return Err(Error::InvalidParameter {
                name: "mi_bins",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.dice_threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "dice_threshold",
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Cluster-extent policy from `p_threshold` and `min_cluster_size`.
    pub fn cluster_policy(&self) -> CorrectionPolicy {
        CorrectionPolicy::Cluster {
            p_threshold: self.p_threshold,
            min_cluster_size: self.min_cluster_size,
        }
    }

    /// Benjamini–Hochberg policy at `fdr_alpha` over all region pairs.
    pub fn fdr_policy(&self) -> CorrectionPolicy {
        CorrectionPolicy::Fdr {
            alpha: self.fdr_alpha,
            n_comparisons: None,
        }
    }

    /// `.npy` store rooted at `output_dir`.
    pub fn store(&self) -> NpyStore {
        NpyStore::new(&self.output_dir)
    }

    /// Unfitted label parcellation using the configured pooling strategy.
    pub fn parcellation(&self, labels: LabelImage, mask: Option<Mask>) -> LabelParcellation {
        LabelParcellation::new(labels, mask).pooling(self.pooling)
    }
}

/// Correlation estimator applied to the rows of a region matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationKind {
    /// Pearson product-moment correlation with a two-sided t-test.
    #[default]
    Pearson,
    /// Spearman rank correlation with its own t approximation.
    Spearman,
    /// Ledoit–Wolf shrinkage correlation. No p-values.
    Ledoit,
}

impl CorrelationKind {
    /// Lowercase name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
            Self::Ledoit => "ledoit",
        }
    }

    /// Whether this estimator produces a p-value matrix.
    pub fn has_p_values(&self) -> bool {
        !matches!(self, Self::Ledoit)
    }
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            "ledoit" | "ledoit_wolf" | "ledoit-wolf" => Ok(Self::Ledoit),
            _ => Err(Error::UnsupportedCorrelationKind(s.to_string())),
        }
    }
}

/// How voxel values inside one region are summarised at each timepoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingStrategy {
    /// Arithmetic mean (default).
    #[default]
    Mean,
    /// Median, averaging the two middle values for even counts.
    Median,
    /// Sum of voxel values.
    Sum,
    /// Smallest voxel value.
    Minimum,
    /// Largest voxel value.
    Maximum,
    /// Population variance.
    Variance,
    /// Population standard deviation.
    StandardDeviation,
}

impl FromStr for PoolingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "sum" => Ok(Self::Sum),
            "minimum" | "min" => Ok(Self::Minimum),
            "maximum" | "max" => Ok(Self::Maximum),
            "variance" => Ok(Self::Variance),
            "standard_deviation" | "std" => Ok(Self::StandardDeviation),
            _ => Err(Error::UnsupportedPoolingStrategy(s.to_string())),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match read_env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key}={raw:?} could not be parsed"))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kind, CorrelationKind::Pearson);
        assert_eq!(config.pooling, PoolingStrategy::Mean);
        assert!(!config.detrend);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("pearson".parse::<CorrelationKind>().unwrap(), CorrelationKind::Pearson);
        assert_eq!(" Spearman ".parse::<CorrelationKind>().unwrap(), CorrelationKind::Spearman);
        assert_eq!("ledoit".parse::<CorrelationKind>().unwrap(), CorrelationKind::Ledoit);

        let err = "kendall".parse::<CorrelationKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedCorrelationKind(ref s) if s == "kendall"));
    }

    #[test]
    fn test_pooling_parsing() {
        assert_eq!("median".parse::<PoolingStrategy>().unwrap(), PoolingStrategy::Median);
        assert_eq!("std".parse::<PoolingStrategy>().unwrap(), PoolingStrategy::StandardDeviation);
        assert!("mode".parse::<PoolingStrategy>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            p_threshold: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            min_cluster_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            fdr_alpha: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_uses_defaults_for_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"kind":"spearman","detrend":true}"#).unwrap();
        assert_eq!(config.kind, CorrelationKind::Spearman);
        assert!(config.detrend);
        assert_eq!(config.min_cluster_size, 1);
        assert_eq!(config.mi_bins, DEFAULT_MI_BINS);
    }

    #[test]
    fn test_policies_follow_fields() {
        let config = Config {
            p_threshold: 0.01,
            min_cluster_size: 4,
            fdr_alpha: 0.1,
            pooling: PoolingStrategy::Median,
            ..Config::default()
        };
        assert_eq!(
            config.cluster_policy(),
            CorrectionPolicy::Cluster {
                p_threshold: 0.01,
                min_cluster_size: 4
            }
        );
        assert_eq!(
            config.fdr_policy(),
            CorrectionPolicy::Fdr {
                alpha: 0.1,
                n_comparisons: None
            }
        );
        assert_eq!(config.store().root(), Path::new("."));
        let labels = LabelImage::new((2, 1, 1), vec![1, 2]).unwrap();
        assert_eq!(config.parcellation(labels, None).pooling_strategy(), PoolingStrategy::Median);
    }

    #[test]
    fn test_ledoit_has_no_p_values() {
        assert!(CorrelationKind::Pearson.has_p_values());
        assert!(CorrelationKind::Spearman.has_p_values());
        assert!(!CorrelationKind::Ledoit.has_p_values());
    }
}
