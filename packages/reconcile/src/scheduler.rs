//! Live scheduler queue queries.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use lifecycle_core::{FilePattern, JobIdentity, SchedulerConfig};

/// The live queue could not be read. Distinct from "no job is active".
#[derive(Debug, thiserror::Error)]
pub enum SchedulerQueryError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not answer within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Future type for live queue queries.
pub type QueryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<BTreeSet<JobIdentity>, SchedulerQueryError>> + Send + 'a>>;

/// Source of the identities the scheduler still owns.
pub trait LiveQueueQuery: Send + Sync {
    /// Identities of every job still in the queue.
    fn live_jobs(&self) -> QueryFuture<'_>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Turn a queue listing into identities.
///
/// Each line is a stdout path; its identity comes from the stdout pattern.
/// With `accept_bare`, a line that does not fit the pattern is taken as an
/// identity as-is. Blank lines and `undefined` are always skipped.
pub fn parse_queue_listing(
    text: &str,
    stdout_pattern: &FilePattern,
    accept_bare: bool,
) -> BTreeSet<JobIdentity> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "undefined")
        .filter_map(|line| {
            stdout_pattern
                .identity_of_path(Path::new(line))
                .or_else(|| {
                    (accept_bare && !line.contains(['/', ' ', '\t'])).then(|| JobIdentity::new(line))
                })
        })
        .collect()
}

/// Queries the scheduler's command-line client, by default `condor_q -af Out`.
pub struct CondorQueue {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    stdout_pattern: FilePattern,
}

impl CondorQueue {
    pub fn new(config: &SchedulerConfig, stdout_pattern: FilePattern) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            stdout_pattern,
        }
    }

    async fn query(&self) -> Result<BTreeSet<JobIdentity>, SchedulerQueryError> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| SchedulerQueryError::Timeout {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| SchedulerQueryError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SchedulerQueryError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let live = parse_queue_listing(&listing, &self.stdout_pattern, false);
        tracing::info!("{} reports {} live jobs", self.program, live.len());
        Ok(live)
    }
}

impl LiveQueueQuery for CondorQueue {
    fn live_jobs(&self) -> QueryFuture<'_> {
        Box::pin(self.query())
    }

    fn describe(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// Reads a saved queue listing: one stdout path or identity per line.
pub struct StaticQueue {
    path: PathBuf,
    stdout_pattern: FilePattern,
}

impl StaticQueue {
    pub fn new(path: impl Into<PathBuf>, stdout_pattern: FilePattern) -> Self {
        Self {
            path: path.into(),
            stdout_pattern,
        }
    }
}

impl LiveQueueQuery for StaticQueue {
    fn live_jobs(&self) -> QueryFuture<'_> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| SchedulerQueryError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            Ok(parse_queue_listing(&text, &self.stdout_pattern, true))
        })
    }

    fn describe(&self) -> String {
        format!("queue listing {}", self.path.display())
    }
}
