//! Core domain types for the batch job lifecycle monitor.
//!
//! This crate contains shared types used across all packages:
//! - JobIdentity and JobFiles for the per-job file group
//! - EventKind, LifecycleEvent and JobTimeline for parsed scheduler logs
//! - DurationRecord for per-state time accounting
//! - PayloadOutcome, ResourceUsage and Classification for reconciliation
//! - MonitorConfig for run configuration

mod classification;
mod config;
mod durations;
mod events;
mod job;
mod timeline;
mod usage;

pub use classification::{Classification, PayloadOutcome, Throughput};
pub use config::{
    ConfigError, FileLayout, FilePattern, MonitorConfig, ReportConfig, SchedulerConfig,
    SubmitConfig,
};
pub use durations::{DurationRecord, DurationState};
pub use events::{EventKind, IGNORED_EVENT_CODES, LifecycleEvent, UnknownEventKind};
pub use job::{FileKind, JobFiles, JobIdentity, RunId};
pub use timeline::{JobTimeline, TimelineError, YearBasis};
pub use usage::{ResourceUsage, Termination};
