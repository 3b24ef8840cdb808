//! Human- and machine-readable reports of a group analysis.

pub mod json;
pub mod terminal;

pub use json::{to_json, to_json_pretty};
pub use terminal::format_result;
