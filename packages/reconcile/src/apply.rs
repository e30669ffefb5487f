//! Clearing stale job files and handing the manifest to the scheduler.

use std::fmt::Write;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use lifecycle_core::{JobFiles, SubmitConfig};
use serde::{Deserialize, Serialize};

use crate::output::{OutputError, write_atomic};

/// Apply errors.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Failed to clear {}: {source}", .path.display())]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read apply marker {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} exited with {status}: {stderr}")]
    SubmitFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Whether apply may change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Describe the plan, touch nothing.
    #[default]
    DryRun,
    Confirmed,
}

/// What a confirmed apply would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    pub manifest: PathBuf,
    pub manifest_text: String,
    pub jobs: usize,
    /// Log, stdout and stderr of every job being resubmitted.
    pub clear: Vec<PathBuf>,
    /// Scheduler log of every job being resubmitted.
    pub logs: Vec<PathBuf>,
    pub command: Vec<String>,
}

impl ApplyPlan {
    pub fn new<'a>(
        manifest: impl Into<PathBuf>,
        manifest_text: impl Into<String>,
        jobs: impl IntoIterator<Item = &'a JobFiles>,
        submit: &SubmitConfig,
    ) -> Self {
        let manifest = manifest.into();
        let mut count = 0;
        let mut clear = Vec::new();
        let mut logs = Vec::new();
        for job in jobs {
            count += 1;
            clear.extend(job.clearable().into_iter().map(Path::to_path_buf));
            logs.push(job.log.clone());
        }
        let command = vec![submit.program.clone(), manifest.display().to_string()];
        Self {
            manifest,
            manifest_text: manifest_text.into(),
            jobs: count,
            clear,
            logs,
            command,
        }
    }

    /// `<manifest>.applied`, recording the last submission.
    pub fn marker_path(&self) -> PathBuf {
        let mut name = self.manifest.file_name().unwrap_or_default().to_os_string();
        name.push(".applied");
        self.manifest.with_file_name(name)
    }

    /// Human-readable plan for a dry run.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Would resubmit {} jobs.", self.jobs);
        let _ = writeln!(out, "Files to clear ({}):", self.clear.len());
        for path in &self.clear {
            let _ = writeln!(out, "  {}", path.display());
        }
        let _ = writeln!(out, "Submit command: {}", self.command.join(" "));
        let _ = writeln!(out, "Re-run with --confirm to apply.");
        out
    }
}

/// Result of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Planned(ApplyPlan),
    AlreadyApplied { marker: PathBuf },
    NothingToSubmit,
    Submitted { cleared: usize, output: String },
}

/// Future type for submissions.
pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ApplyError>> + Send + 'a>>;

/// Hands a manifest to the scheduler; resolves to the submitter's output.
pub trait Submitter: Send + Sync {
    fn submit<'a>(&'a self, manifest: &'a Path) -> SubmitFuture<'a>;
}

/// Runs `condor_submit <manifest>` or whatever program is configured.
pub struct CondorSubmit {
    program: String,
    timeout: Duration,
}

impl CondorSubmit {
    pub fn new(config: &SubmitConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn run(&self, manifest: &Path) -> Result<String, ApplyError> {
        let mut command = tokio::process::Command::new(&self.program);
        command.arg(manifest).kill_on_drop(true);
        tracing::info!("Running {} {}", self.program, manifest.display());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ApplyError::Timeout {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| ApplyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ApplyError::SubmitFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Submitter for CondorSubmit {
    fn submit<'a>(&'a self, manifest: &'a Path) -> SubmitFuture<'a> {
        Box::pin(self.run(manifest))
    }
}

/// Remove a file; `Ok(false)` if it was already gone.
async fn clear_file(path: &Path) -> Result<bool, ApplyError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Cleared {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ApplyError::Clear {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Contents of the `.applied` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMarker {
    pub manifest_text: String,
    /// Logs cleared before the submit.
    pub logs: Vec<PathBuf>,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMarker {
    fn for_plan(plan: &ApplyPlan) -> Self {
        Self {
            manifest_text: plan.manifest_text.clone(),
            logs: plan.logs.clone(),
            applied_at: Utc::now(),
        }
    }

    /// First cleared log the scheduler has written again.
    async fn rewritten_log(&self) -> Option<&Path> {
        for log in &self.logs {
            if matches!(tokio::fs::try_exists(log).await, Ok(true)) {
                return Some(log);
            }
        }
        None
    }
}

async fn read_marker(marker: &Path) -> Result<Option<AppliedMarker>, ApplyError> {
    let text = match tokio::fs::read_to_string(marker).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ApplyError::Marker {
                path: marker.to_path_buf(),
                source,
            });
        }
    };
    match serde_json::from_str(&text) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable marker {}: {}", marker.display(), e);
            Ok(None)
        }
    }
}

/// Carry out `plan`.
///
/// Applying the same manifest text twice submits once; the second call
/// finds the marker and returns `AlreadyApplied`. Once the scheduler has
/// written any of the cleared logs again, the marker is stale and an
/// identical manifest is submitted anew.
pub async fn apply(
    plan: &ApplyPlan,
    mode: ApplyMode,
    submitter: &dyn Submitter,
) -> Result<ApplyOutcome, ApplyError> {
    if plan.jobs == 0 {
        tracing::info!("No jobs to resubmit");
        return Ok(ApplyOutcome::NothingToSubmit);
    }

    let marker = plan.marker_path();
    let previous = read_marker(&marker)
        .await?
        .filter(|previous| previous.manifest_text == plan.manifest_text);
    if let Some(previous) = previous {
        match previous.rewritten_log().await {
            None => {
                tracing::info!(
                    "{} was already submitted at {}",
                    plan.manifest.display(),
                    previous.applied_at
                );
                return Ok(ApplyOutcome::AlreadyApplied { marker });
            }
            Some(log) => tracing::info!(
                "{} exists again; submission from {} is stale",
                log.display(),
                previous.applied_at
            ),
        }
    }

    if mode == ApplyMode::DryRun {
        return Ok(ApplyOutcome::Planned(plan.clone()));
    }

    let removed = try_join_all(plan.clear.iter().map(|path| clear_file(path))).await?;
    let cleared = removed.into_iter().filter(|removed| *removed).count();
    tracing::info!("Cleared {} of {} job files", cleared, plan.clear.len());

    let output = submitter.submit(&plan.manifest).await?;
    let record = serde_json::to_string_pretty(&AppliedMarker::for_plan(plan))
        .map_err(OutputError::from)?;
    write_atomic(&marker, &record).await?;
    tracing::info!("Submitted {} jobs from {}", plan.jobs, plan.manifest.display());

    Ok(ApplyOutcome::Submitted { cleared, output })
}
