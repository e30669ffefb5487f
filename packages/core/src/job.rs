//! Job identity and the per-job file group.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity shared by a job's log, stdout, stderr and result artifact.
///
/// Derived from the base file name of the job's scheduler log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    /// Create an identity from a base name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The four kinds of file a job owns on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Log,
    Stdout,
    Stderr,
    Artifact,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::Log,
        FileKind::Stdout,
        FileKind::Stderr,
        FileKind::Artifact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Log => "log",
            FileKind::Stdout => "stdout",
            FileKind::Stderr => "stderr",
            FileKind::Artifact => "artifact",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved on-disk files of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFiles {
    pub identity: JobIdentity,
    pub log: PathBuf,
    pub stdout: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl JobFiles {
    pub fn new(identity: JobIdentity, log: impl Into<PathBuf>, stdout: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            log: log.into(),
            stdout: stdout.into(),
            stderr: None,
            artifact: None,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<PathBuf>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Files removed before a job is resubmitted. The artifact is never touched.
    pub fn clearable(&self) -> Vec<&Path> {
        let mut files = vec![self.log.as_path(), self.stdout.as_path()];
        if let Some(stderr) = &self.stderr {
            files.push(stderr.as_path());
        }
        files
    }
}

/// Unique identifier of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Create a new run ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
