//! Lifecycle transition validation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lifecycle_core::{EventKind, JobIdentity, JobTimeline};

use EventKind::*;

/// Event kinds after which the payload is considered to be running.
const RUNNING: [EventKind; 4] = [Executing, Reconnected, Unsuspended, Checkpointed];

const FROM_RUNNING: [EventKind; 10] = [
    Evicted,
    Terminated,
    Disconnected,
    ShadowException,
    Held,
    Aborted,
    ExecutableError,
    Checkpointed,
    Suspended,
    RemoteError,
];

const OTHER: &[(EventKind, &[EventKind])] = &[
    (
        Submitted,
        &[Executing, Held, Aborted, ExecutableError, ShadowException],
    ),
    (Evicted, &[Executing, Submitted, Held, Aborted, ShadowException]),
    (Disconnected, &[Reconnected, ReconnectFailed]),
    (
        ReconnectFailed,
        &[Executing, Evicted, ShadowException, Submitted, Held, Aborted],
    ),
    (Held, &[Released, Aborted]),
    (Released, &[Executing, Held, Aborted]),
    (Suspended, &[Unsuspended, Evicted, Held, Aborted]),
    (
        ShadowException,
        &[Executing, Evicted, Submitted, Held, Aborted],
    ),
    (
        RemoteError,
        &[Executing, Evicted, Terminated, ShadowException, Held, Aborted],
    ),
    (
        ExecutableError,
        &[Executing, Evicted, Terminated, Submitted, Held, Aborted],
    ),
    // Manual relaunch into the same log.
    (Aborted, &[Submitted]),
    (Terminated, &[Submitted]),
];

/// Why a timeline failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{identity}: illegal transition {from} -> {to} at line {line}")]
    Illegal {
        identity: JobIdentity,
        from: EventKind,
        to: EventKind,
        line: usize,
    },

    #[error("{identity}: {kind} at line {line} is earlier than the event before it")]
    OutOfOrder {
        identity: JobIdentity,
        kind: EventKind,
        line: usize,
    },
}

impl TransitionError {
    pub fn identity(&self) -> &JobIdentity {
        match self {
            TransitionError::Illegal { identity, .. }
            | TransitionError::OutOfOrder { identity, .. } => identity,
        }
    }
}

/// A timeline whose every consecutive pair passed the transition table.
///
/// Only [`TransitionTable::validate`] hands these out.
#[derive(Debug, Clone, Copy)]
pub struct CertifiedTimeline<'a> {
    timeline: &'a JobTimeline,
}

impl<'a> CertifiedTimeline<'a> {
    pub fn timeline(&self) -> &'a JobTimeline {
        self.timeline
    }
}

/// Set of legal `(from, to)` event pairs.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    allowed: HashSet<(EventKind, EventKind)>,
}

impl TransitionTable {
    /// The built-in table.
    pub fn standard() -> Self {
        let mut table = Self {
            allowed: HashSet::new(),
        };
        for from in RUNNING {
            for to in FROM_RUNNING {
                table.allow(from, to);
            }
        }
        for (from, targets) in OTHER {
            for to in *targets {
                table.allow(*from, *to);
            }
        }
        table
    }

    /// The built-in table plus `extra` pairs.
    pub fn with(extra: impl IntoIterator<Item = (EventKind, EventKind)>) -> Self {
        let mut table = Self::standard();
        for (from, to) in extra {
            table.allow(from, to);
        }
        table
    }

    /// Accept one more transition.
    pub fn allow(&mut self, from: EventKind, to: EventKind) -> &mut Self {
        self.allowed.insert((from, to));
        self
    }

    pub fn is_allowed(&self, from: EventKind, to: EventKind) -> bool {
        self.allowed.contains(&(from, to))
    }

    /// Check every consecutive pair of `timeline`, stopping at the first bad one.
    pub fn validate<'a>(
        &self,
        timeline: &'a JobTimeline,
    ) -> Result<CertifiedTimeline<'a>, TransitionError> {
        for (prev, next) in timeline.pairs() {
            if next.timestamp < prev.timestamp {
                return Err(TransitionError::OutOfOrder {
                    identity: timeline.identity().clone(),
                    kind: next.kind,
                    line: next.line,
                });
            }
            if !self.is_allowed(prev.kind, next.kind) {
                return Err(TransitionError::Illegal {
                    identity: timeline.identity().clone(),
                    from: prev.kind,
                    to: next.kind,
                    line: next.line,
                });
            }
        }
        Ok(CertifiedTimeline { timeline })
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What went wrong, with the job identity stripped off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Anomaly {
    Illegal { from: EventKind, to: EventKind },
    OutOfOrder { kind: EventKind },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::Illegal { from, to } => write!(f, "{from} -> {to}"),
            Anomaly::OutOfOrder { kind } => write!(f, "{kind} out of order"),
        }
    }
}

/// Jobs sharing one transition anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSummary {
    pub anomaly: Anomaly,
    pub jobs: BTreeSet<JobIdentity>,
}

impl std::fmt::Display for TransitionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} job(s):", self.anomaly, self.jobs.len())?;
        for job in &self.jobs {
            write!(f, " {job}")?;
        }
        Ok(())
    }
}

/// Group transition errors from many jobs by anomaly.
pub fn summarize<'a>(
    errors: impl IntoIterator<Item = &'a TransitionError>,
) -> Vec<TransitionSummary> {
    let mut grouped: BTreeMap<Anomaly, BTreeSet<JobIdentity>> = BTreeMap::new();
    for err in errors {
        let anomaly = match err {
            TransitionError::Illegal { from, to, .. } => Anomaly::Illegal {
                from: *from,
                to: *to,
            },
            TransitionError::OutOfOrder { kind, .. } => Anomaly::OutOfOrder { kind: *kind },
        };
        grouped
            .entry(anomaly)
            .or_default()
            .insert(err.identity().clone());
    }
    grouped
        .into_iter()
        .map(|(anomaly, jobs)| TransitionSummary { anomaly, jobs })
        .collect()
}
