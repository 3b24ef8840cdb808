//! In-memory volume model: scalar volumes, series, label images and masks.
//!
//! Voxels are stored flat in x-fastest order, so voxel `(x, y, z)` lives at
//! `x + nx * (y + ny * z)`.

use crate::error::{Error, Result};

/// Grid dimensions `(nx, ny, nz)`.
pub type Grid = (usize, usize, usize);

fn voxel_count(dims: Grid) -> usize {
    dims.0 * dims.1 * dims.2
}

fn check_len(dims: Grid, len: usize, what: &'static str) -> Result<()> {
    let expected = voxel_count(dims);
    if expected == 0 {
        return Err(Error::InvalidParameter {
            name: what,
            reason: format!("grid {dims:?} has no voxels"),
        });
    }
    if len != expected {
        return Err(Error::InvalidParameter {
            name: what,
            reason: format!("grid {dims:?} needs {expected} voxels, got {len}"),
        });
    }
    Ok(())
}

/// A single 3D scalar volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: Grid,
    data: Vec<f64>,
}

impl Volume {
    /// Wrap flat voxel data. Fails if `data.len()` does not match `dims`.
    pub fn new(dims: Grid, data: Vec<f64>) -> Result<Self> {
        check_len(dims, data.len(), "volume")?;
        Ok(Self { dims, data })
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(dims: Grid, mut f: impl FnMut(usize, usize, usize) -> f64) -> Result<Self> {
        let mut data = Vec::with_capacity(voxel_count(dims));
        for z in 0..dims.2 {
            for y in 0..dims.1 {
                for x in 0..dims.0 {
                    data.push(f(x, y, z));
                }
            }
        }
        Self::new(dims, data)
    }

    /// Grid dimensions.
    pub fn dims(&self) -> Grid {
        self.dims
    }

    /// Flat voxel values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value at `(x, y, z)`, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        let (nx, ny, nz) = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        self.data.get(x + nx * (y + ny * z)).copied()
    }
}

/// Ordered volumes sharing one grid, indexed by timepoint.
///
/// A cohort series is usually the concatenation of every subject's volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSeries {
    dims: Grid,
    volumes: Vec<Volume>,
}

impl VolumeSeries {
    /// Build a series. Every volume must share the first volume's grid.
    pub fn new(volumes: Vec<Volume>) -> Result<Self> {
        let Some(first) = volumes.first() else {
            return Err(Error::InsufficientData {
                what: "volume series",
                got: 0,
                need: 1,
            });
        };
        let dims = first.dims();
        if let Some(bad) = volumes.iter().find(|v| v.dims() != dims) {
            return Err(Error::GridMismatch {
                expected: dims,
                found: bad.dims(),
            });
        }
        Ok(Self { dims, volumes })
    }

    /// Concatenate several series along the time axis, in order.
    pub fn concat(series: &[VolumeSeries]) -> Result<Self> {
        let volumes = series
            .iter()
            .flat_map(|s| s.volumes.iter().cloned())
            .collect();
        Self::new(volumes)
    }

    /// Grid shared by every volume.
    pub fn dims(&self) -> Grid {
        self.dims
    }

    /// Number of timepoints.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Always false; a series holds at least one volume.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// The volumes in timepoint order.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }
}

/// Integer region label per voxel. Label 0 is background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelImage {
    dims: Grid,
    labels: Vec<u32>,
}

impl LabelImage {
    /// Wrap flat labels. Fails if `labels.len()` does not match `dims`.
    pub fn new(dims: Grid, labels: Vec<u32>) -> Result<Self> {
        check_len(dims, labels.len(), "label image")?;
        Ok(Self { dims, labels })
    }

    /// Grid dimensions.
    pub fn dims(&self) -> Grid {
        self.dims
    }

    /// Flat labels.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

/// Binary voxel mask; `false` voxels are excluded from pooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    dims: Grid,
    voxels: Vec<bool>,
}

impl Mask {
    /// Wrap a flat boolean mask.
    pub fn new(dims: Grid, voxels: Vec<bool>) -> Result<Self> {
        check_len(dims, voxels.len(), "mask")?;
        Ok(Self { dims, voxels })
    }

    /// Keep voxels whose value in `volume` is strictly above `threshold`.
    pub fn from_threshold(volume: &Volume, threshold: f64) -> Self {
        Self {
            dims: volume.dims(),
            voxels: volume.data().iter().map(|&v| v > threshold).collect(),
        }
    }

    /// Grid dimensions.
    pub fn dims(&self) -> Grid {
        self.dims
    }

    /// Whether the voxel at flat index `idx` is included.
    pub fn contains(&self, idx: usize) -> bool {
        self.voxels.get(idx).copied().unwrap_or(false)
    }

    /// Number of included voxels.
    pub fn count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }
}
