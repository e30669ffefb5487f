//! Full per-job scan: parse, validate, aggregate, read stdout and usage.

use std::path::PathBuf;

use lifecycle_core::{
    DurationRecord, JobFiles, JobIdentity, JobTimeline, MonitorConfig, PayloadOutcome,
    ResourceUsage,
};

use crate::durations::{DurationError, aggregate};
use crate::parser::{EventLogParser, MalformedLogError};
use crate::payload::scan_stdout_file;
use crate::transitions::{TransitionError, TransitionTable};
use crate::usage::extract_usage_file;

/// Why one job could not be analysed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Malformed(#[from] MalformedLogError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Duration(#[from] DurationError),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker failed while scanning: {0}")]
    Worker(String),
}

/// Everything a scan needs besides the job's files.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub completion_phrase: String,
    pub parser: EventLogParser,
    pub transitions: TransitionTable,
}

impl ScanSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        let parser = match config.reference_year {
            Some(year) => EventLogParser::new(year),
            None => EventLogParser::current_year(),
        };
        Self {
            completion_phrase: config.completion_phrase.clone(),
            parser,
            transitions: TransitionTable::with(config.extra_transitions.iter().copied()),
        }
    }
}

/// Result of analysing one job.
#[derive(Debug, Clone)]
pub struct JobAnalysis {
    pub files: JobFiles,
    pub timeline: JobTimeline,
    pub durations: DurationRecord,
    pub outcome: PayloadOutcome,
    pub usage: ResourceUsage,
}

impl JobAnalysis {
    pub fn identity(&self) -> &JobIdentity {
        &self.files.identity
    }
}

/// Analyse one job. Blocking; reads every file of the job once.
pub fn analyze_job(files: &JobFiles, settings: &ScanSettings) -> Result<JobAnalysis, JobError> {
    let timeline = settings
        .parser
        .parse_file(&files.log, files.identity.clone())?;
    let certified = settings.transitions.validate(&timeline)?;
    let durations = aggregate(certified)?;

    let stdout = scan_stdout_file(&files.stdout, &settings.completion_phrase).map_err(
        |source| JobError::Io {
            path: files.stdout.clone(),
            source,
        },
    )?;
    let usage = extract_usage_file(&files.log).map_err(|source| JobError::Io {
        path: files.log.clone(),
        source,
    })?;

    if stdout.empty {
        tracing::debug!("{} has empty stdout; likely still running", files.identity);
    }

    let outcome = PayloadOutcome {
        completion_phrase_found: stdout.phrase_found,
        stdout_empty: stdout.empty,
        artifact_present: files.artifact.is_some(),
        throughput: stdout.throughput,
    };

    Ok(JobAnalysis {
        files: files.clone(),
        timeline,
        durations,
        outcome,
        usage,
    })
}
