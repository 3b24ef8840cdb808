//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::result::{CohortSummary, GroupSummary};

/// Format a GroupSummary for human-readable terminal output.
pub fn format_result(summary: &GroupSummary) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str("covmap\n");
    output.push_str(&sep);
    output.push('\n');
    output.push('\n');

    output.push_str(&format!(
        "  Estimator: {}{}\n",
        summary.metadata.kind,
        if summary.metadata.detrend { " (detrended)" } else { "" }
    ));
    output.push_str(&format!("  Regions:   {}\n", summary.n_regions));
    output.push('\n');

    for cohort in [&summary.cohort_a, &summary.cohort_b] {
        push_cohort(&mut output, cohort);
    }

    output.push_str(&format!(
        "  Contrast {} - {}: max |z| = {:.2}\n",
        summary.cohort_a.label, summary.cohort_b.label, summary.max_abs_difference
    ));

    if let Some(ref permutation) = summary.permutation {
        let line = format!(
            "{} region pairs significant after {} permutations (FWER 0.05)",
            permutation.n_significant_pairs, permutation.n_permutations
        );
        if permutation.n_significant_pairs > 0 {
            output.push_str(&format!("  {}\n", format!("\u{26A0} {line}").yellow().bold()));
        } else {
            output.push_str(&format!("  {}\n", format!("\u{2713} {line}").green()));
        }
    }
    output.push('\n');

    output.push_str(&sep);
    output.push('\n');
    output.push_str(&format!(
        "Completed in {:.2}s; {} files written.\n",
        summary.metadata.runtime_secs,
        summary.metadata.saved.len()
    ));

    output
}

fn push_cohort(output: &mut String, cohort: &CohortSummary) {
    if cohort.sample_size == cohort.n_observations {
        output.push_str(&format!(
            "  {} ({} observations)\n",
            cohort.label.bold(),
            cohort.n_observations
        ));
    } else {
        output.push_str(&format!(
            "  {} ({} observations, n = {})\n",
            cohort.label.bold(),
            cohort.n_observations,
            cohort.sample_size
        ));
    }
    output.push_str(&format!("    Mean correlation: {:.3}\n", cohort.mean_correlation));
    if let Some(shrinkage) = cohort.shrinkage {
        output.push_str(&format!("    Shrinkage:        {:.3}\n", shrinkage));
    }
    if cohort.n_substituted > 0 {
        output.push_str(&format!(
            "    {}\n",
            format!("{} correlations set to 0 (zero-variance regions)", cohort.n_substituted).yellow()
        ));
    }
    match (cohort.n_clusters, cohort.n_significant) {
        (Some(clusters), Some(entries)) => output.push_str(&format!(
            "    Clusters:         {} ({} entries)\n",
            format_count(clusters),
            entries
        )),
        _ => output.push_str("    Clusters:         n/a (no p-values)\n"),
    }
    output.push('\n');
}

fn format_count(n: usize) -> String {
    if n == 0 {
        n.to_string().dimmed().to_string()
    } else {
        n.to_string().green().bold().to_string()
    }
}
