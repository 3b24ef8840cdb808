//! Parcellation: reducing voxel-level volume series to region matrices.
//!
//! - [`volume`]: in-memory volumes, series, label images and masks
//! - [`labels`]: the fitted label-image scheme and the [`Parcellator`] seam
//! - [`reducer`]: reduction entry point and explicit detrending

pub mod labels;
pub mod reducer;
pub mod volume;

pub use labels::{pool, LabelParcellation, Parcellator};
pub use reducer::{detrend_in_place, reduce};
pub use volume::{Grid, LabelImage, Mask, Volume, VolumeSeries};
