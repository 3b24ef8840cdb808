//! Significance tests for correlation coefficients.
//!
//! Both tests are two-sided t-tests on `n - 2` degrees of freedom and use
//! the Student's t survival function from `statrs`.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Error, Result};
use crate::types::{CorrelationMatrix, PValueMatrix};

/// Degrees of freedom for a correlation over `n_observations` samples.
///
/// Fails when fewer than three observations leave no degrees of freedom.
pub fn correlation_dof(n_observations: usize) -> Result<f64> {
    if n_observations < 3 {
        return Err(Error::InsufficientData {
            what: "correlation significance test",
            got: n_observations,
            need: 3,
        });
    }
    Ok((n_observations - 2) as f64)
}

fn t_distribution(dof: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, dof).map_err(|e| Error::InvalidParameter {
        name: "dof",
        reason: e.to_string(),
    })
}

/// Two-sided p-value `2 * sf(|t|)`. An infinite statistic gives 0.
pub fn two_sided_p_value(t: f64, dist: &StudentsT) -> f64 {
    if t.is_nan() {
        return 1.0;
    }
    if t.is_infinite() {
        return 0.0;
    }
    (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0)
}

/// Pearson t statistic `r * sqrt(dof) / sqrt(1 - r^2)`.
pub fn pearson_t_statistic(r: f64, dof: f64) -> f64 {
    r * dof.sqrt() / (1.0 - r * r).sqrt()
}

/// Spearman t approximation `r * sqrt(dof / ((1 + r)(1 - r)))`.
pub fn spearman_t_statistic(r: f64, dof: f64) -> f64 {
    r * (dof / ((1.0 + r) * (1.0 - r))).sqrt()
}

/// P-values for an already clamped Pearson correlation matrix.
pub fn pearson_p_values(correlation: &CorrelationMatrix, n_observations: usize) -> Result<PValueMatrix> {
    let dof = correlation_dof(n_observations)?;
    let dist = t_distribution(dof)?;
    Ok(correlation.map(|r| two_sided_p_value(pearson_t_statistic(r, dof), &dist)))
}

/// P-values for a Spearman correlation matrix. Perfect rank agreement
/// (`|r| >= 1`) has p = 0.
pub fn spearman_p_values(correlation: &CorrelationMatrix, n_observations: usize) -> Result<PValueMatrix> {
    let dof = correlation_dof(n_observations)?;
    let dist = t_distribution(dof)?;
    Ok(correlation.map(|r| {
        if r.abs() >= 1.0 {
            0.0
        } else {
            two_sided_p_value(spearman_t_statistic(r, dof), &dist)
        }
    }))
}
