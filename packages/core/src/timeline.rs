//! Ordered lifecycle of one job.

use serde::{Deserialize, Serialize};

use crate::{EventKind, JobIdentity, LifecycleEvent};

/// How the calendar year of the timeline's timestamps was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum YearBasis {
    /// Every timestamp carried its own year.
    Explicit,
    /// The log omits the year; `year` was assumed for the first event and
    /// incremented `rollovers` times when the month went backwards.
    Assumed { year: i32, rollovers: u32 },
}

impl YearBasis {
    /// Whether the timestamps are an approximation across a year boundary.
    pub fn spans_year_boundary(&self) -> bool {
        matches!(self, YearBasis::Assumed { rollovers, .. } if *rollovers > 0)
    }
}

/// Reasons a sequence of events cannot form a timeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("Log contains no lifecycle events")]
    Empty,

    #[error("First event is {first}, expected submitted")]
    MissingSubmit { first: EventKind },
}

/// Ordered, immutable sequence of lifecycle events for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimeline {
    identity: JobIdentity,
    events: Vec<LifecycleEvent>,
    year_basis: YearBasis,
}

impl JobTimeline {
    /// Build a timeline, checking that it opens with a submit event.
    pub fn new(
        identity: JobIdentity,
        events: Vec<LifecycleEvent>,
        year_basis: YearBasis,
    ) -> Result<Self, TimelineError> {
        let first = events.first().ok_or(TimelineError::Empty)?;
        if first.kind != EventKind::Submitted {
            return Err(TimelineError::MissingSubmit { first: first.kind });
        }
        Ok(Self {
            identity,
            events,
            year_basis,
        })
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    pub fn year_basis(&self) -> YearBasis {
        self.year_basis
    }

    pub fn first(&self) -> &LifecycleEvent {
        // Non-empty by construction.
        &self.events[0]
    }

    pub fn last(&self) -> &LifecycleEvent {
        &self.events[self.events.len() - 1]
    }

    /// The terminal event the timeline ends with, if the job has finished.
    pub fn terminal(&self) -> Option<EventKind> {
        let kind = self.last().kind;
        kind.is_terminal().then_some(kind)
    }

    /// Whether any event of the given kind occurs.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Whether the user aborted the job at any point.
    pub fn was_aborted(&self) -> bool {
        self.contains(EventKind::Aborted)
    }

    /// Whether the scheduler's last word on the job is a termination.
    pub fn ended_terminated(&self) -> bool {
        self.terminal() == Some(EventKind::Terminated)
    }

    /// Seconds between the first and last event.
    pub fn total_secs(&self) -> i64 {
        (self.last().timestamp - self.first().timestamp).num_seconds()
    }

    /// Consecutive event pairs in log order.
    pub fn pairs(&self) -> impl Iterator<Item = (&LifecycleEvent, &LifecycleEvent)> {
        self.events.windows(2).map(|w| (&w[0], &w[1]))
    }
}
