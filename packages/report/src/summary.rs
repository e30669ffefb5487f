//! Summary statistics and the JSON run summary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use chrono::{DateTime, Utc};
use lifecycle_core::{Classification, JobIdentity, RunId};
use scan::JobAnalysis;
use serde::{Deserialize, Serialize};

use crate::metrics::hms;

/// Average, minimum and maximum of a set of durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStats {
    pub count: usize,
    pub avg_secs: i64,
    pub min_secs: i64,
    pub max_secs: i64,
}

impl TimeStats {
    /// `None` for an empty input.
    pub fn from_secs(values: impl IntoIterator<Item = i64>) -> Option<Self> {
        let values: Vec<i64> = values.into_iter().collect();
        let count = values.len();
        let min_secs = *values.iter().min()?;
        let max_secs = *values.iter().max()?;
        let avg_secs = values.iter().sum::<i64>() / count as i64;
        Some(Self {
            count,
            avg_secs,
            min_secs,
            max_secs,
        })
    }
}

/// Statistics over total and loop time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_time: Option<TimeStats>,
    pub loop_time: Option<TimeStats>,
}

impl SummaryStats {
    pub fn from_analyses(analyses: &[JobAnalysis]) -> Self {
        Self {
            total_time: TimeStats::from_secs(analyses.iter().map(|a| a.durations.total_secs)),
            loop_time: TimeStats::from_secs(
                analyses
                    .iter()
                    .filter_map(|a| a.outcome.throughput.loop_secs),
            ),
        }
    }

    /// Plain-text rendering for the console.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (title, stats) in [("Looper Time", &self.loop_time), ("Total Time", &self.total_time)] {
            let _ = writeln!(out, "{title}");
            match stats {
                Some(stats) => {
                    let _ = writeln!(out, "\t Avg: {}", hms(stats.avg_secs));
                    let _ = writeln!(out, "\t Min: {}", hms(stats.min_secs));
                    let _ = writeln!(out, "\t Max: {}", hms(stats.max_secs));
                }
                None => {
                    let _ = writeln!(out, "\t no data");
                }
            }
        }
        out
    }
}

/// A job that could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprocessedJob {
    pub identity: JobIdentity,
    pub error: String,
}

/// Machine-readable record of one run, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    /// `strict` when invariants were checked, `dumb` otherwise.
    pub mode: String,
    pub counts: BTreeMap<Classification, usize>,
    pub members: BTreeMap<Classification, Vec<JobIdentity>>,
    pub resubmit: Vec<JobIdentity>,
    pub unprocessed: Vec<UnprocessedJob>,
    pub warnings: Vec<String>,
    pub stats: SummaryStats,
}

impl RunSummary {
    pub fn new(
        run_id: RunId,
        mode: impl Into<String>,
        classifications: &BTreeMap<JobIdentity, Classification>,
        resubmit: &BTreeSet<JobIdentity>,
    ) -> Self {
        let mut members: BTreeMap<Classification, Vec<JobIdentity>> = Classification::ALL
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect();
        for (identity, class) in classifications {
            members.entry(*class).or_default().push(identity.clone());
        }
        let counts = members.iter().map(|(c, ids)| (*c, ids.len())).collect();

        Self {
            run_id,
            generated_at: Utc::now(),
            mode: mode.into(),
            counts,
            members,
            resubmit: resubmit.iter().cloned().collect(),
            unprocessed: Vec::new(),
            warnings: Vec::new(),
            stats: SummaryStats::default(),
        }
    }

    pub fn with_unprocessed(mut self, unprocessed: Vec<UnprocessedJob>) -> Self {
        self.unprocessed = unprocessed;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_stats(mut self, stats: SummaryStats) -> Self {
        self.stats = stats;
        self
    }

    /// One line per classification, for the console.
    pub fn headline(&self) -> String {
        let parts: Vec<String> = Classification::ALL
            .into_iter()
            .map(|c| format!("{} {}", self.counts.get(&c).copied().unwrap_or(0), c))
            .collect();
        format!(
            "{}; {} to resubmit; {} unprocessed",
            parts.join(", "),
            self.resubmit.len(),
            self.unprocessed.len()
        )
    }
}
