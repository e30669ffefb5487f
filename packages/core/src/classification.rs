//! Payload-level outcome and the final per-job classification.

use serde::{Deserialize, Serialize};

/// Reconciled state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Terminated with the completion phrase and a result artifact.
    Complete,
    /// Ran to the end but produced no usable result.
    Failed,
    /// Removed by the user at some point.
    Aborted,
    /// Still owned by the scheduler.
    Active,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Complete,
        Classification::Failed,
        Classification::Aborted,
        Classification::Active,
    ];

    /// Whether the job belongs in the resubmission manifest.
    pub fn needs_resubmission(self) -> bool {
        match self {
            Classification::Failed | Classification::Aborted => true,
            Classification::Complete | Classification::Active => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Complete => "complete",
            Classification::Failed => "failed",
            Classification::Aborted => "aborted",
            Classification::Active => "active",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Throughput figures the payload reports on stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Throughput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_processed: Option<u64>,
    /// Processing rate in events per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_hz: Option<f64>,
    /// Wall time spent in the payload's event loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_secs: Option<i64>,
}

/// What a job's stdout and the artifact directory say, independent of the log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadOutcome {
    pub completion_phrase_found: bool,
    pub stdout_empty: bool,
    pub artifact_present: bool,
    #[serde(default)]
    pub throughput: Throughput,
}

impl PayloadOutcome {
    /// Whether the payload finished and left its artifact behind.
    pub fn is_useful(&self) -> bool {
        self.completion_phrase_found && self.artifact_present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_and_aborted_are_resubmitted() {
        let resubmitted: Vec<_> = Classification::ALL
            .into_iter()
            .filter(|c| c.needs_resubmission())
            .collect();
        assert_eq!(
            resubmitted,
            vec![Classification::Failed, Classification::Aborted]
        );
    }
}
