//! Per-state duration accounting over a certified timeline.

use lifecycle_core::{DurationRecord, DurationState, JobIdentity};

use crate::transitions::CertifiedTimeline;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("{identity}: state durations sum to {sum}s but the job spans {total}s")]
    Unbalanced {
        identity: JobIdentity,
        sum: i64,
        total: i64,
    },
}

/// Attribute the time between consecutive events to the state of the earlier one.
pub fn aggregate(certified: CertifiedTimeline<'_>) -> Result<DurationRecord, DurationError> {
    let timeline = certified.timeline();
    let mut record = DurationRecord::new(timeline.identity().clone(), timeline.total_secs());

    for (prev, next) in timeline.pairs() {
        let secs = (next.timestamp - prev.timestamp).num_seconds();
        record.add(DurationState::of(prev.kind), secs);
    }

    if !record.is_balanced() {
        return Err(DurationError::Unbalanced {
            identity: record.identity.clone(),
            sum: record.sum_secs(),
            total: record.total_secs,
        });
    }
    Ok(record)
}
