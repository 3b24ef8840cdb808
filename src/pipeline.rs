//! Main `GroupCovariance` entry point and builder.

use std::time::Instant;

use crate::analysis::{
    cluster_threshold, compare_maps, difference, permutation_test, MapSimilarity, DEFAULT_PERMUTATION_SEED,
};
use crate::config::{Config, CorrelationKind};
use crate::error::{Error, Result};
use crate::parcellation::{detrend_in_place, reduce, Parcellator, VolumeSeries};
use crate::result::{CohortResult, GroupResult, Metadata};
use crate::statistics::correlate;
use crate::storage::{ArrayStore, NdArray};
use crate::types::{CorrelationMatrix, RegionMatrix};

/// A named group of subjects whose volumes are analysed together.
#[derive(Debug, Clone)]
pub struct Cohort {
    /// Name used in persisted file names (`{prefix}reduced_{label}`).
    pub label: String,
    /// Concatenated volumes of every subject in the cohort.
    pub volumes: VolumeSeries,
    /// Number of subjects, when it differs from the number of volumes.
    pub n_subjects: Option<usize>,
}

impl Cohort {
    /// Create a cohort from its label and volumes, one volume per subject.
    pub fn new(label: impl Into<String>, volumes: VolumeSeries) -> Self {
        Self {
            label: label.into(),
            volumes,
            n_subjects: None,
        }
    }

    /// Set the subject count used as the contrast's sample size.
    pub fn subjects(mut self, n: usize) -> Self {
        self.n_subjects = Some(n);
        self
    }

    /// Sample size for the Fisher z contrast: the subject count if set,
    /// otherwise the number of volumes.
    pub fn sample_size(&self) -> usize {
        self.n_subjects.unwrap_or_else(|| self.volumes.len())
    }
}

/// Group functional covariance analysis of two cohorts.
///
/// Use the builder pattern to configure the run, then pass both cohorts, a
/// fitted parcellation and a store for the persisted arrays.
///
/// # Example
///
/// ```ignore
/// use covmap::{Cohort, CorrelationKind, GroupCovariance, NpyStore};
///
/// let mut store = NpyStore::new("outputs/perf_covar");
/// let result = GroupCovariance::new()
///     .kind(CorrelationKind::Pearson)
///     .output_prefix("aal_")
///     .run(&Cohort::new("hc", hc), &Cohort::new("bd", bd), &scheme, &mut store)?;
///
/// println!("max |z| = {:.2}", result.max_abs_difference());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupCovariance {
    config: Config,
}

impl GroupCovariance {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the correlation estimator.
    pub fn kind(mut self, kind: CorrelationKind) -> Self {
        self.config.kind = kind;
        self
    }

    /// Remove each observation's mean across regions before correlating.
    pub fn detrend(mut self, detrend: bool) -> Self {
        self.config.detrend = detrend;
        self
    }

    /// Prefix for every persisted file name.
    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    /// Per-entry threshold for cluster-extent correction of each cohort.
    pub fn p_threshold(mut self, p_threshold: f64) -> Self {
        self.config.p_threshold = p_threshold;
        self
    }

    /// Minimum cluster size for cluster-extent correction.
    pub fn min_cluster_size(mut self, size: usize) -> Self {
        self.config.min_cluster_size = size;
        self
    }

    /// Number of permutations for the max-statistic test (0 disables it).
    pub fn permutations(mut self, n: usize) -> Self {
        self.config.n_permutations = n;
        self
    }

    /// Base seed for the permutation test.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reduce, correlate and contrast two cohorts.
    ///
    /// Cohort A is processed before cohort B. Each reduced matrix is saved
    /// as `{prefix}reduced_{label}` and the stack `[A, B, A - B]` as
    /// `{prefix}cors`.
    ///
    /// # Errors
    ///
    /// - [`Error::RegionCountMismatch`] if the cohorts reduce to different
    ///   region counts.
    /// - Any reduction, correlation, configuration or storage error.
    pub fn run<P, S>(&self, cohort_a: &Cohort, cohort_b: &Cohort, parcellator: &P, store: &mut S) -> Result<GroupResult>
    where
        P: Parcellator + ?Sized,
        S: ArrayStore + ?Sized,
    {
        self.config.validate()?;
        tracing::info!(
            cohort_a = %cohort_a.label,
            cohort_b = %cohort_b.label,
            regions = parcellator.n_regions(),
            "reducing cohorts"
        );

        let reduced_a = reduce(&cohort_a.volumes, parcellator, false)?;
        let reduced_b = reduce(&cohort_b.volumes, parcellator, false)?;

        self.run_reduced(
            (&cohort_a.label, reduced_a, cohort_a.sample_size()),
            (&cohort_b.label, reduced_b, cohort_b.sample_size()),
            parcellator.region_labels(),
            store,
        )
    }

    /// Correlate and contrast two already-reduced cohorts.
    ///
    /// Each argument pairs a cohort label with its `regions x observations`
    /// matrix; the observation count is the contrast's sample size.
    /// `region_labels` names the rows and is recorded in the metadata.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn run_matrices<S>(
        &self,
        cohort_a: (&str, RegionMatrix),
        cohort_b: (&str, RegionMatrix),
        region_labels: &[u32],
        store: &mut S,
    ) -> Result<GroupResult>
    where
        S: ArrayStore + ?Sized,
    {
        let (label_a, matrix_a) = cohort_a;
        let (label_b, matrix_b) = cohort_b;
        let (n_a, n_b) = (matrix_a.ncols(), matrix_b.ncols());
        self.run_reduced((label_a, matrix_a, n_a), (label_b, matrix_b, n_b), region_labels, store)
    }

    fn run_reduced<S>(
        &self,
        cohort_a: (&str, RegionMatrix, usize),
        cohort_b: (&str, RegionMatrix, usize),
        region_labels: &[u32],
        store: &mut S,
    ) -> Result<GroupResult>
    where
        S: ArrayStore + ?Sized,
    {
        let start = Instant::now();
        self.config.validate()?;

        let (label_a, matrix_a, n_a) = cohort_a;
        let (label_b, matrix_b, n_b) = cohort_b;
        if matrix_a.nrows() != matrix_b.nrows() {
            return Err(Error::RegionCountMismatch {
                cohort_a: matrix_a.nrows(),
                cohort_b: matrix_b.nrows(),
            });
        }

        let mut saved = Vec::new();
        let result_a = self.analyse_cohort(label_a, matrix_a, n_a, store, &mut saved)?;
        let result_b = self.analyse_cohort(label_b, matrix_b, n_b, store, &mut saved)?;

        let difference = difference(
            result_a.correlation(),
            result_b.correlation(),
            result_a.sample_size,
            result_b.sample_size,
        )?;

        let stack = NdArray::from_stack(&[result_a.correlation(), result_b.correlation(), &difference])?;
        saved.push(store.save(&self.file_name("cors"), &stack)?);

        let permutation = match self.config.n_permutations {
            0 => None,
            n => {
                let seed = self.config.seed.unwrap_or(DEFAULT_PERMUTATION_SEED);
                Some(permutation_test(&result_a.reduced, &result_b.reduced, n, seed)?)
            }
        };

        let mut result = GroupResult {
            cohort_a: result_a,
            cohort_b: result_b,
            difference,
            permutation,
            metadata: Metadata {
                kind: self.config.kind,
                detrend: self.config.detrend,
                region_labels: region_labels.to_vec(),
                output_prefix: self.config.output_prefix.clone(),
                saved,
                runtime_secs: 0.0,
            },
        };

        let mut document = serde_json::Map::new();
        document.insert("config".to_string(), serde_json::to_value(&self.config)?);
        document.insert("summary".to_string(), serde_json::to_value(result.summary())?);
        let summary_path = store.save_json(&self.file_name("summary"), &serde_json::Value::Object(document))?;
        result.metadata.saved.push(summary_path);
        result.metadata.runtime_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            regions = result.n_regions(),
            max_abs_z = result.max_abs_difference(),
            runtime_secs = result.metadata.runtime_secs,
            "group covariance complete"
        );
        Ok(result)
    }

    /// Dice overlap and mutual information between two maps, using the
    /// configured `dice_threshold` and `mi_bins`.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the maps differ in shape.
    pub fn similarity(&self, map_a: &CorrelationMatrix, map_b: &CorrelationMatrix) -> Result<MapSimilarity> {
        compare_maps(map_a, map_b, self.config.dice_threshold, self.config.mi_bins)
    }

    fn analyse_cohort<S>(
        &self,
        label: &str,
        mut reduced: RegionMatrix,
        sample_size: usize,
        store: &mut S,
        saved: &mut Vec<std::path::PathBuf>,
    ) -> Result<CohortResult>
    where
        S: ArrayStore + ?Sized,
    {
        if self.config.detrend {
            detrend_in_place(&mut reduced);
        }
        let name = self.file_name(&format!("reduced_{label}"));
        saved.push(store.save(&name, &NdArray::from_matrix(&reduced))?);

        let estimate = correlate(&reduced, self.config.kind)?;
        let clusters = estimate
            .p_values
            .as_ref()
            .map(|p| cluster_threshold(p, self.config.p_threshold, self.config.min_cluster_size));

        Ok(CohortResult {
            label: label.to_string(),
            reduced,
            sample_size,
            estimate,
            clusters,
        })
    }

    fn file_name(&self, stem: &str) -> String {
        format!("{}{}", self.config.output_prefix, stem)
    }
}
