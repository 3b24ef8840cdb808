//! Label-image parcellation: a fixed region scheme fitted once and reused.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::PoolingStrategy;
use crate::error::{Error, Result};
use crate::types::RegionMatrix;

use super::volume::{LabelImage, Mask, VolumeSeries};

/// A fitted region scheme that turns a volume series into a region matrix.
///
/// Implementations must return rows in the same order for every call, so
/// that matrices from different cohorts index the same regions.
pub trait Parcellator {
    /// Number of regions (rows) produced by [`transform`](Self::transform).
    fn n_regions(&self) -> usize;

    /// Region labels in row order.
    fn region_labels(&self) -> &[u32];

    /// Reduce a series to a `(regions, timepoints)` matrix.
    fn transform(&self, volumes: &VolumeSeries) -> Result<RegionMatrix>;
}

#[derive(Debug, Clone)]
struct FittedRegions {
    labels: Vec<u32>,
    voxels: Vec<Vec<usize>>,
}

/// Parcellation driven by an integer label image and an optional mask.
///
/// # Example
///
/// ```ignore
/// let mut scheme = LabelParcellation::new(atlas, Some(mask));
/// scheme.fit()?;
/// let reduced = scheme.transform(&cohort_volumes)?;
/// ```
#[derive(Debug, Clone)]
pub struct LabelParcellation {
    labels: LabelImage,
    mask: Option<Mask>,
    pooling: PoolingStrategy,
    fitted: Option<FittedRegions>,
}

impl LabelParcellation {
    /// Create an unfitted scheme with mean pooling.
    pub fn new(labels: LabelImage, mask: Option<Mask>) -> Self {
        Self {
            labels,
            mask,
            pooling: PoolingStrategy::Mean,
            fitted: None,
        }
    }

    /// Override the pooling strategy.
    pub fn pooling(mut self, pooling: PoolingStrategy) -> Self {
        self.pooling = pooling;
        self
    }

    /// The pooling strategy in effect.
    pub fn pooling_strategy(&self) -> PoolingStrategy {
        self.pooling
    }

    /// Whether [`fit`](Self::fit) has been called.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Finalise the region set: every non-zero label with at least one
    /// in-mask voxel, in ascending label order.
    ///
    /// Can only be called once; the ordering is then fixed for every
    /// subsequent transform.
    pub fn fit(&mut self) -> Result<&mut Self> {
        if self.fitted.is_some() {
            return Err(Error::AlreadyFitted);
        }
        if let Some(mask) = &self.mask {
            if mask.dims() != self.labels.dims() {
                return Err(Error::GridMismatch {
                    expected: self.labels.dims(),
                    found: mask.dims(),
                });
            }
        }

        let mut all_labels: Vec<u32> = self.labels.labels().iter().copied().filter(|&l| l != 0).collect();
        all_labels.sort_unstable();
        all_labels.dedup();

        let mut labels = Vec::with_capacity(all_labels.len());
        let mut voxels = Vec::with_capacity(all_labels.len());
        for &label in &all_labels {
            let members: Vec<usize> = self
                .labels
                .labels()
                .iter()
                .enumerate()
                .filter(|&(idx, &l)| l == label && self.mask.as_ref().map_or(true, |m| m.contains(idx)))
                .map(|(idx, _)| idx)
                .collect();
            if members.is_empty() {
                tracing::warn!(label, "region has no voxels inside the mask; dropped");
                continue;
            }
            labels.push(label);
            voxels.push(members);
        }

        if labels.is_empty() {
            return Err(Error::InsufficientData {
                what: "parcellation regions",
                got: 0,
                need: 1,
            });
        }

        tracing::debug!(regions = labels.len(), "parcellation fitted");
        self.fitted = Some(FittedRegions { labels, voxels });
        Ok(self)
    }

    fn fitted(&self) -> Result<&FittedRegions> {
        self.fitted.as_ref().ok_or(Error::NotFitted)
    }
}

impl Parcellator for LabelParcellation {
    fn n_regions(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.labels.len())
    }

    fn region_labels(&self) -> &[u32] {
        self.fitted.as_ref().map(|f| f.labels.as_slice()).unwrap_or(&[])
    }

    fn transform(&self, volumes: &VolumeSeries) -> Result<RegionMatrix> {
        let fitted = self.fitted()?;
        if volumes.dims() != self.labels.dims() {
            return Err(Error::GridMismatch {
                expected: self.labels.dims(),
                found: volumes.dims(),
            });
        }

        let pooling = self.pooling;
        let pool_volume = |data: &[f64]| -> Vec<f64> {
            let mut scratch = Vec::new();
            fitted
                .voxels
                .iter()
                .map(|members| {
                    scratch.clear();
                    scratch.extend(members.iter().map(|&idx| data[idx]));
                    pool(&mut scratch, pooling)
                })
                .collect()
        };

        #[cfg(feature = "parallel")]
        let columns: Vec<Vec<f64>> = crate::thread_pool::install(|| {
            volumes
                .volumes()
                .par_iter()
                .map(|v| pool_volume(v.data()))
                .collect()
        });

        #[cfg(not(feature = "parallel"))]
        let columns: Vec<Vec<f64>> = volumes.volumes().iter().map(|v| pool_volume(v.data())).collect();

        let n_regions = fitted.labels.len();
        Ok(RegionMatrix::from_fn(n_regions, columns.len(), |r, t| columns[t][r]))
    }
}

/// Summarise one region's voxel values. `values` is reordered for the median.
///
/// # Panics
///
/// Panics if `values` is empty; fitted regions always have members.
pub fn pool(values: &mut [f64], strategy: PoolingStrategy) -> f64 {
    assert!(!values.is_empty(), "Cannot pool an empty region");
    let n = values.len() as f64;
    match strategy {
        PoolingStrategy::Mean => values.iter().sum::<f64>() / n,
        PoolingStrategy::Sum => values.iter().sum(),
        PoolingStrategy::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
        PoolingStrategy::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        PoolingStrategy::Median => median(values),
        PoolingStrategy::Variance => population_variance(values),
        PoolingStrategy::StandardDeviation => population_variance(values).sqrt(),
    }
}

fn population_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    let mid = n / 2;
    let (lower, &mut upper_mid, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    if n % 2 == 1 {
        return upper_mid;
    }
    let lower_mid = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    0.5 * (lower_mid + upper_mid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcellation::volume::Volume;

    fn atlas() -> LabelImage {
        // 4 voxels: labels 2, 2, 0, 5
        LabelImage::new((4, 1, 1), vec![2, 2, 0, 5]).unwrap()
    }

    fn series() -> VolumeSeries {
        VolumeSeries::new(vec![
            Volume::new((4, 1, 1), vec![1.0, 3.0, 100.0, 7.0]).unwrap(),
            Volume::new((4, 1, 1), vec![2.0, 6.0, 100.0, 9.0]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_fit_orders_labels_ascending() {
        let mut scheme = LabelParcellation::new(atlas(), None);
        scheme.fit().unwrap();
        assert_eq!(scheme.region_labels(), &[2, 5]);
        assert_eq!(scheme.n_regions(), 2);
    }

    #[test]
    fn test_mean_pooling_ignores_background() {
        let mut scheme = LabelParcellation::new(atlas(), None);
        scheme.fit().unwrap();
        let m = scheme.transform(&series()).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(0, 1)], 4.0);
        assert_eq!(m[(1, 0)], 7.0);
        assert_eq!(m[(1, 1)], 9.0);
    }

    #[test]
    fn test_mask_drops_voxels_and_empty_regions() {
        let mask = Mask::new((4, 1, 1), vec![true, false, true, false]).unwrap();
        let mut scheme = LabelParcellation::new(atlas(), Some(mask));
        scheme.fit().unwrap();
        assert_eq!(scheme.region_labels(), &[2]);
        let m = scheme.transform(&series()).unwrap();
        assert_eq!(m.shape(), (1, 2));
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 1)], 2.0);
    }

    #[test]
    fn test_fit_once_and_transform_requires_fit() {
        let mut scheme = LabelParcellation::new(atlas(), None);
        assert!(matches!(scheme.transform(&series()).unwrap_err(), Error::NotFitted));
        scheme.fit().unwrap();
        assert!(matches!(scheme.fit().unwrap_err(), Error::AlreadyFitted));
    }

    #[test]
    fn test_transform_rejects_other_grid() {
        let mut scheme = LabelParcellation::new(atlas(), None);
        scheme.fit().unwrap();
        let other = VolumeSeries::new(vec![Volume::new((2, 2, 1), vec![0.0; 4]).unwrap()]).unwrap();
        assert!(matches!(scheme.transform(&other).unwrap_err(), Error::GridMismatch { .. }));
    }

    #[test]
    fn test_pooling_strategies() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(pool(&mut v.clone(), PoolingStrategy::Mean), 2.5);
        assert_eq!(pool(&mut v.clone(), PoolingStrategy::Sum), 10.0);
        assert_eq!(pool(&mut v.clone(), PoolingStrategy::Minimum), 1.0);
        assert_eq!(pool(&mut v.clone(), PoolingStrategy::Maximum), 4.0);
        assert_eq!(pool(&mut v.clone(), PoolingStrategy::Median), 2.5);
        assert!((pool(&mut v.clone(), PoolingStrategy::Variance) - 1.25).abs() < 1e-12);
        assert!((pool(&mut v, PoolingStrategy::StandardDeviation) - 1.25f64.sqrt()).abs() < 1e-12);

        let mut odd = vec![9.0, 1.0, 5.0];
        assert_eq!(pool(&mut odd, PoolingStrategy::Median), 5.0);
    }

    #[test]
    fn test_median_pooling_through_transform() {
        let labels = LabelImage::new((3, 1, 1), vec![1, 1, 1]).unwrap();
        let mut scheme = LabelParcellation::new(labels, None).pooling(PoolingStrategy::Median);
        scheme.fit().unwrap();
        let series = VolumeSeries::new(vec![Volume::new((3, 1, 1), vec![10.0, 1.0, 4.0]).unwrap()]).unwrap();
        let m = scheme.transform(&series).unwrap();
        assert_eq!(m[(0, 0)], 4.0);
    }
}
