//! Per-job scanning of scheduler logs and captured output.
//!
//! Everything here is synchronous and works on one job at a time; the
//! `actors` crate runs [`analyze_job`] across a worker pool.

pub mod analysis;
pub mod discovery;
pub mod durations;
pub mod parser;
pub mod payload;
pub mod transitions;
pub mod usage;

pub use analysis::{JobAnalysis, JobError, ScanSettings, analyze_job};
pub use discovery::{Discovery, DiscoveryError, discover};
pub use durations::{DurationError, aggregate};
pub use parser::{EventLogParser, MalformedLogError};
pub use payload::{StdoutScan, scan_stdout, scan_stdout_file};
pub use transitions::{
    Anomaly, CertifiedTimeline, TransitionError, TransitionSummary, TransitionTable, summarize,
};
pub use usage::{extract_usage, extract_usage_file};
