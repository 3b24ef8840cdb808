//! Reduction of a volume series to a region matrix, with optional detrending.

use crate::error::{Error, Result};
use crate::types::RegionMatrix;

use super::labels::Parcellator;
use super::volume::VolumeSeries;

/// Reduce `volumes` with a fitted parcellation.
///
/// When `detrend` is set, the returned matrix has already been passed
/// through [`detrend_in_place`]. Persisting the result is the caller's job
/// (the pipeline does it under a cohort-qualified name).
pub fn reduce<P>(volumes: &VolumeSeries, parcellator: &P, detrend: bool) -> Result<RegionMatrix>
where
    P: Parcellator + ?Sized,
{
    let mut reduced = parcellator.transform(volumes)?;
    if reduced.nrows() != parcellator.n_regions() {
        return Err(Error::ShapeMismatch {
            expected: (parcellator.n_regions(), volumes.len()),
            found: reduced.shape(),
        });
    }
    tracing::debug!(
        regions = reduced.nrows(),
        timepoints = reduced.ncols(),
        detrend,
        "reduced volume series"
    );
    if detrend {
        detrend_in_place(&mut reduced);
    }
    Ok(reduced)
}

/// Remove global signal drift: subtract, at every timepoint (column), the
/// mean across regions.
///
/// This mutates the matrix; it is the only in-place step of the pipeline.
pub fn detrend_in_place(matrix: &mut RegionMatrix) {
    if matrix.nrows() == 0 {
        return;
    }
    let n = matrix.nrows() as f64;
    for mut column in matrix.column_iter_mut() {
        let mean = column.sum() / n;
        column.add_scalar_mut(-mean);
    }
}
