//! Fractional ranking for rank correlation.

/// Rank `values` from 1, giving tied values the average of their ranks.
///
/// NaN sorts after every finite value (total ordering).
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let start = i;
        let value = values[order[i]];
        i += 1;
        while i < order.len() && values[order[i]] == value {
            i += 1;
        }
        let avg_rank = (start + i - 1) as f64 / 2.0 + 1.0;
        for &idx in &order[start..i] {
            ranks[idx] = avg_rank;
        }
    }
    ranks
}
