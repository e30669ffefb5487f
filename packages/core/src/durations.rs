//! Per-state time accounting for one job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EventKind, JobIdentity};

/// A state time is attributed to. Several event kinds share one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationState {
    Queued,
    Running,
    Disconnected,
    ReconnectFailed,
    Evicted,
    ShadowException,
    Held,
    Suspended,
    Errored,
    Aborted,
    Terminated,
}

impl DurationState {
    pub const ALL: [DurationState; 11] = [
        DurationState::Queued,
        DurationState::Running,
        DurationState::Disconnected,
        DurationState::ReconnectFailed,
        DurationState::Evicted,
        DurationState::ShadowException,
        DurationState::Held,
        DurationState::Suspended,
        DurationState::Errored,
        DurationState::Aborted,
        DurationState::Terminated,
    ];

    /// Canonical state for time following an event of `kind`.
    pub fn of(kind: EventKind) -> Self {
        match kind {
            EventKind::Submitted | EventKind::Released => DurationState::Queued,
            EventKind::Executing
            | EventKind::Reconnected
            | EventKind::Unsuspended
            | EventKind::Checkpointed => DurationState::Running,
            EventKind::Disconnected => DurationState::Disconnected,
            EventKind::ReconnectFailed => DurationState::ReconnectFailed,
            EventKind::Evicted => DurationState::Evicted,
            EventKind::ShadowException => DurationState::ShadowException,
            EventKind::Held => DurationState::Held,
            EventKind::Suspended => DurationState::Suspended,
            EventKind::ExecutableError | EventKind::RemoteError => DurationState::Errored,
            EventKind::Aborted => DurationState::Aborted,
            EventKind::Terminated => DurationState::Terminated,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DurationState::Queued => "queued",
            DurationState::Running => "running",
            DurationState::Disconnected => "disconnected",
            DurationState::ReconnectFailed => "reconnect_failed",
            DurationState::Evicted => "evicted",
            DurationState::ShadowException => "shadow_exception",
            DurationState::Held => "held",
            DurationState::Suspended => "suspended",
            DurationState::Errored => "errored",
            DurationState::Aborted => "aborted",
            DurationState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for DurationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds spent in each state by one job, plus the total elapsed time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRecord {
    pub identity: JobIdentity,
    pub per_state: BTreeMap<DurationState, i64>,
    pub total_secs: i64,
}

impl DurationRecord {
    pub fn new(identity: JobIdentity, total_secs: i64) -> Self {
        Self {
            identity,
            per_state: BTreeMap::new(),
            total_secs,
        }
    }

    /// Add seconds to a state.
    pub fn add(&mut self, state: DurationState, secs: i64) {
        *self.per_state.entry(state).or_insert(0) += secs;
    }

    /// Seconds spent in a state (zero if never entered).
    pub fn get(&self, state: DurationState) -> i64 {
        self.per_state.get(&state).copied().unwrap_or(0)
    }

    pub fn sum_secs(&self) -> i64 {
        self.per_state.values().sum()
    }

    /// Whether the per-state durations add up to the total.
    pub fn is_balanced(&self) -> bool {
        self.sum_secs() == self.total_secs
    }
}
