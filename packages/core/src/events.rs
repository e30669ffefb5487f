//! Scheduler lifecycle event vocabulary.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Event codes that carry no state change and are skipped by the parser.
///
/// - 006: image size of job updated
/// - 008: generic log event
/// - 028: job ad information event triggered
/// - 033: job attribute update
/// - 040: file transfer
pub const IGNORED_EVENT_CODES: &[u16] = &[6, 8, 28, 33, 40];

/// A lifecycle transition recorded by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Submitted,
    Executing,
    ExecutableError,
    Checkpointed,
    Evicted,
    Terminated,
    ShadowException,
    Aborted,
    Suspended,
    Unsuspended,
    Held,
    Released,
    RemoteError,
    Disconnected,
    Reconnected,
    ReconnectFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::Submitted,
        EventKind::Executing,
        EventKind::ExecutableError,
        EventKind::Checkpointed,
        EventKind::Evicted,
        EventKind::Terminated,
        EventKind::ShadowException,
        EventKind::Aborted,
        EventKind::Suspended,
        EventKind::Unsuspended,
        EventKind::Held,
        EventKind::Released,
        EventKind::RemoteError,
        EventKind::Disconnected,
        EventKind::Reconnected,
        EventKind::ReconnectFailed,
    ];

    /// The scheduler's numeric event code.
    pub fn code(self) -> u16 {
        match self {
            EventKind::Submitted => 0,
            EventKind::Executing => 1,
            EventKind::ExecutableError => 2,
            EventKind::Checkpointed => 3,
            EventKind::Evicted => 4,
            EventKind::Terminated => 5,
            EventKind::ShadowException => 7,
            EventKind::Aborted => 9,
            EventKind::Suspended => 10,
            EventKind::Unsuspended => 11,
            EventKind::Held => 12,
            EventKind::Released => 13,
            EventKind::RemoteError => 21,
            EventKind::Disconnected => 22,
            EventKind::Reconnected => 23,
            EventKind::ReconnectFailed => 24,
        }
    }

    /// Map a numeric event code back to its kind.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether this event ends a job's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::Terminated | EventKind::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Submitted => "submitted",
            EventKind::Executing => "executing",
            EventKind::ExecutableError => "executable-error",
            EventKind::Checkpointed => "checkpointed",
            EventKind::Evicted => "evicted",
            EventKind::Terminated => "terminated",
            EventKind::ShadowException => "shadow-exception",
            EventKind::Aborted => "aborted",
            EventKind::Suspended => "suspended",
            EventKind::Unsuspended => "unsuspended",
            EventKind::Held => "held",
            EventKind::Released => "released",
            EventKind::RemoteError => "remote-error",
            EventKind::Disconnected => "disconnected",
            EventKind::Reconnected => "reconnected",
            EventKind::ReconnectFailed => "reconnect-failed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an event name is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl std::str::FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// One parsed event of a job's scheduler log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    /// 1-based line number in the source log.
    pub line: usize,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, timestamp: NaiveDateTime, line: usize) -> Self {
        Self {
            kind,
            timestamp,
            line,
        }
    }
}
