use std::cmp::Ordering;

use crate::insights::TrendRow;

fn compare(a: &TrendRow, b: &TrendRow) -> Ordering {
    b.delta_score
        .cmp(&a.delta_score)
        .then_with(|| b.stars_total.cmp(&a.stars_total))
        .then_with(|| b.forks_total.cmp(&a.forks_total))
}

/// Highest `(delta_score, stars_total, forks_total)` first, keeping the top `top_n`.
///
/// The sort is stable, so rows that tie on all three keep their relative order
/// and ranking an already-ranked list is a no-op.
pub fn rank_trend_rows(mut rows: Vec<TrendRow>, top_n: usize) -> Vec<TrendRow> {
    rows.sort_by(compare);
    rows.truncate(top_n);
    rows
}
