//! Top-N rankings per metric.

use std::cmp::Ordering;
use std::fmt::Write;

use lifecycle_core::JobIdentity;
use scan::JobAnalysis;

use crate::metrics::{Metric, MetricValue};

/// The jobs with the highest values of one metric.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub metric: Metric,
    /// Highest first.
    pub entries: Vec<(JobIdentity, MetricValue)>,
    /// Jobs whose output did not report the metric.
    pub missing: Vec<JobIdentity>,
}

/// Rank `analyses` by `metric`, keeping the top `top_n`.
///
/// Ties are broken by identity so the output is stable.
pub fn rank(analyses: &[JobAnalysis], metric: Metric, top_n: usize) -> Ranking {
    let mut entries = Vec::new();
    let mut missing = Vec::new();
    for analysis in analyses {
        match metric.value(analysis) {
            Some(value) => entries.push((analysis.identity().clone(), value)),
            None => missing.push(analysis.identity().clone()),
        }
    }
    entries.sort_by(|(a_id, a), (b_id, b)| {
        b.magnitude()
            .partial_cmp(&a.magnitude())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_id.cmp(b_id))
    });
    entries.truncate(top_n);
    missing.sort();
    Ranking {
        metric,
        entries,
        missing,
    }
}

/// Rank by every metric of the catalog.
pub fn rank_all(analyses: &[JobAnalysis], top_n: usize) -> Vec<Ranking> {
    Metric::catalog()
        .into_iter()
        .map(|metric| rank(analyses, metric, top_n))
        .collect()
}

/// Render rankings as plain text.
pub fn render_rankings(rankings: &[Ranking]) -> String {
    let mut out = String::new();
    for ranking in rankings {
        let _ = writeln!(out, "Ranking for {}", ranking.metric.title());
        for (index, (identity, value)) in ranking.entries.iter().enumerate() {
            let _ = writeln!(out, "{:4}) {:>10} : {}", index + 1, value.to_string(), identity);
        }
        if !ranking.missing.is_empty() {
            let names: Vec<&str> = ranking.missing.iter().map(|id| id.as_str()).collect();
            let _ = writeln!(out, "      missing ({}): {}", names.len(), names.join(", "));
        }
        out.push('\n');
    }
    out
}
