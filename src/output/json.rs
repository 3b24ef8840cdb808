//! JSON export of [`GroupSummary`] records.
//!
//! The summary carries figures and metadata only; the full matrices are
//! persisted separately through an [`ArrayStore`](crate::ArrayStore).
//! Non-finite figures, such as an infinite `max_abs_difference` after an
//! exact `r = -1` in one cohort, are written as `null`.

use crate::error::Result;
use crate::result::GroupSummary;

/// Compact single-line JSON.
///
/// # Errors
///
/// [`Error::Json`](crate::Error::Json) if a path in `metadata.saved` is not
/// valid UTF-8.
pub fn to_json(summary: &GroupSummary) -> Result<String> {
    Ok(serde_json::to_string(summary)?)
}

/// Indented JSON for reading by hand.
///
/// # Errors
///
/// As [`to_json`].
pub fn to_json_pretty(summary: &GroupSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
