//! Scheduler-reported resource usage from a job's terminal log section.

use serde::{Deserialize, Serialize};

/// How the scheduler says the job's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Normal { return_value: i32 },
    Abnormal { signal: i32 },
}

/// Peak disk and memory figures, in megabytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_used_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_allocated_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_allocated_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

impl ResourceUsage {
    /// Whether the log had no terminal section to read.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
