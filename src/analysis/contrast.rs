//! Fisher z contrast between two cohort correlation maps.

use crate::error::{ensure_same_shape, Error, Result};
use crate::types::{CorrelationMatrix, DifferenceMap};

/// Elementwise Fisher transform `atanh(r)`.
pub fn fisher_z(map: &CorrelationMatrix) -> DifferenceMap {
    map.map(f64::atanh)
}

/// Z-scored difference of two correlation maps:
///
/// ```text
/// z = (atanh(a) - atanh(b)) / sqrt(1/n_a + 1/n_b)
/// ```
///
/// Identical entries contribute exactly 0, including `|r| = 1` where the
/// transform itself is infinite, so `difference(A, A, n, n)` is the zero map.
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] if the maps differ in shape.
/// - [`Error::InsufficientData`] if either sample size is zero.
pub fn difference(
    map_a: &CorrelationMatrix,
    map_b: &CorrelationMatrix,
    n_a: usize,
    n_b: usize,
) -> Result<DifferenceMap> {
    ensure_same_shape(map_a.shape(), map_b.shape())?;
    for n in [n_a, n_b] {
        if n < 1 {
            return Err(Error::InsufficientData {
                what: "cohort sample size",
                got: n,
                need: 1,
            });
        }
    }

    let scale = (1.0 / n_a as f64 + 1.0 / n_b as f64).sqrt();
    Ok(map_a.zip_map(map_b, |a, b| {
        if a == b {
            0.0
        } else {
            (a.atanh() - b.atanh()) / scale
        }
    }))
}
