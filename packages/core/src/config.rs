//! Run configuration for the monitor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{EventKind, FileKind, JobIdentity};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Name pattern of one kind of job file: `<prefix><identity><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePattern {
    pub prefix: String,
    pub suffix: String,
}

impl FilePattern {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Derive the identity from a bare file name, if the name fits the pattern.
    pub fn identity_of(&self, file_name: &str) -> Option<JobIdentity> {
        let stem = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        (!stem.is_empty()).then(|| JobIdentity::new(stem))
    }

    /// Derive the identity from the final component of a path.
    pub fn identity_of_path(&self, path: &Path) -> Option<JobIdentity> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.identity_of(name))
    }

    /// File name this pattern gives the identity.
    pub fn file_name(&self, identity: &JobIdentity) -> String {
        format!("{}{}{}", self.prefix, identity, self.suffix)
    }

    fn specificity(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// File naming scheme shared by every job in the monitored directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLayout {
    pub log: FilePattern,
    pub stdout: FilePattern,
    pub stderr: FilePattern,
    pub artifact: FilePattern,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            log: FilePattern::new("", ".log"),
            stdout: FilePattern::new("", ".out"),
            stderr: FilePattern::new("", ".err"),
            artifact: FilePattern::new("", ".root"),
        }
    }
}

impl FileLayout {
    pub fn pattern(&self, kind: FileKind) -> &FilePattern {
        match kind {
            FileKind::Log => &self.log,
            FileKind::Stdout => &self.stdout,
            FileKind::Stderr => &self.stderr,
            FileKind::Artifact => &self.artifact,
        }
    }

    /// Work out which kind of job file a name is, among `kinds`.
    ///
    /// When several patterns fit, the one with the longest fixed parts wins.
    pub fn classify(&self, file_name: &str, kinds: &[FileKind]) -> Option<(FileKind, JobIdentity)> {
        kinds
            .iter()
            .filter_map(|&kind| {
                let pattern = self.pattern(kind);
                pattern
                    .identity_of(file_name)
                    .map(|identity| (pattern.specificity(), kind, identity))
            })
            .max_by_key(|(specificity, _, _)| *specificity)
            .map(|(_, kind, identity)| (kind, identity))
    }
}

/// How to query the scheduler for jobs it still owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub program: String,
    /// Arguments making the program print one stdout path per queued job.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "condor_q".to_string(),
            args: vec!["-af".to_string(), "Out".to_string()],
            timeout_secs: 30,
        }
    }
}

/// Submission script format and the command that submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    pub program: String,
    pub timeout_secs: u64,
    /// First token of the line opening a directive block.
    pub start_token: String,
    /// Exact content of the line closing a directive block.
    pub end_token: String,
    /// Key whose value names the job's log file inside a block.
    pub identity_key: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            program: "condor_submit".to_string(),
            timeout_secs: 120,
            start_token: "arguments".to_string(),
            end_token: "queue".to_string(),
            identity_key: "log".to_string(),
        }
    }
}

/// Summary report options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Entries shown per ranking.
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Full configuration of one monitor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory holding every job's log, stdout and stderr.
    pub log_dir: PathBuf,
    /// Directory holding result artifacts; defaults to `log_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
    pub layout: FileLayout,
    /// Exact string the payload prints on stdout once it has finished.
    pub completion_phrase: String,
    /// Year assumed for timestamps that omit it; the current year if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_year: Option<i32>,
    /// Number of parallel scan workers.
    pub pool_size: usize,
    /// Transitions accepted on top of the built-in table.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_transitions: Vec<(EventKind, EventKind)>,
    pub scheduler: SchedulerConfig,
    pub submit: SubmitConfig,
    pub report: ReportConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            artifact_dir: None,
            layout: FileLayout::default(),
            completion_phrase: "Done.".to_string(),
            reference_year: None,
            pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            extra_transitions: Vec::new(),
            scheduler: SchedulerConfig::default(),
            submit: SubmitConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a config for a log directory.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `RECONCILE_*` environment variables on top of this config.
    ///
    /// - `RECONCILE_LOG_DIR`
    /// - `RECONCILE_ARTIFACT_DIR`
    /// - `RECONCILE_PASS_PHRASE`
    /// - `RECONCILE_REFERENCE_YEAR`
    /// - `RECONCILE_POOL_SIZE`
    /// - `RECONCILE_SCHEDULER_TIMEOUT` (seconds)
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(dir) = env_var("RECONCILE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("RECONCILE_ARTIFACT_DIR") {
            self.artifact_dir = Some(PathBuf::from(dir));
        }
        if let Some(phrase) = env_var("RECONCILE_PASS_PHRASE") {
            self.completion_phrase = phrase;
        }
        if let Some(year) = parse_env("RECONCILE_REFERENCE_YEAR")? {
            self.reference_year = Some(year);
        }
        if let Some(size) = parse_env("RECONCILE_POOL_SIZE")? {
            self.pool_size = size;
        }
        if let Some(secs) = parse_env("RECONCILE_SCHEDULER_TIMEOUT")? {
            self.scheduler.timeout_secs = secs;
        }
        Ok(self)
    }

    /// Set the artifact directory.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Set the completion phrase.
    pub fn with_completion_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.completion_phrase = phrase.into();
        self
    }

    /// Set the reference year for yearless timestamps.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Set the number of scan workers.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Directory searched for result artifacts.
    pub fn artifact_dir(&self) -> &Path {
        self.artifact_dir.as_deref().unwrap_or(&self.log_dir)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion_phrase.is_empty() {
            return Err(ConfigError::Invalid("completion phrase is empty".into()));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool size must be at least 1".into()));
        }
        for kind in FileKind::ALL {
            let pattern = self.layout.pattern(kind);
            if pattern.prefix.is_empty() && pattern.suffix.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{kind} file pattern needs a prefix or a suffix"
                )));
            }
        }
        if self.submit.start_token.trim().is_empty() || self.submit.end_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "submission block tokens must not be empty".into(),
            ));
        }
        if self.submit.identity_key.trim().is_empty() {
            return Err(ConfigError::Invalid("identity key must not be empty".into()));
        }
        if self.scheduler.enabled && self.scheduler.program.is_empty() {
            return Err(ConfigError::Invalid("scheduler program is empty".into()));
        }
        Ok(())
    }
}

fn env_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_strips_prefix_and_suffix() {
        let pattern = FilePattern::new("log_", ".log");
        assert_eq!(
            pattern.identity_of("log_group.data15.p3637_13.log"),
            Some(JobIdentity::new("group.data15.p3637_13"))
        );
        assert_eq!(pattern.identity_of("group.log"), None);
        assert_eq!(pattern.identity_of("log_.log"), None);
        assert_eq!(
            pattern.file_name(&JobIdentity::new("x")),
            "log_x.log".to_string()
        );
    }

    #[test]
    fn classify_prefers_most_specific_pattern() {
        let mut layout = FileLayout::default();
        layout.artifact = FilePattern::new("", ".out.root");
        let (kind, identity) = layout
            .classify("job7.out.root", &FileKind::ALL)
            .unwrap();
        assert_eq!(kind, FileKind::Artifact);
        assert_eq!(identity.as_str(), "job7");

        let (kind, _) = layout.classify("job7.out", &FileKind::ALL).unwrap();
        assert_eq!(kind, FileKind::Stdout);
        assert!(layout.classify("README", &FileKind::ALL).is_none());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{
                "log_dir": "/batch/out",
                "completion_phrase": "Ana    Done.",
                "extra_transitions": [["held", "terminated"]],
                "scheduler": { "timeout_secs": 5 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/batch/out"));
        assert_eq!(config.artifact_dir(), Path::new("/batch/out"));
        assert_eq!(config.scheduler.timeout_secs, 5);
        assert_eq!(config.scheduler.program, "condor_q");
        assert_eq!(
            config.extra_transitions,
            vec![(EventKind::Held, EventKind::Terminated)]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_phrase_and_zero_pool() {
        let config = MonitorConfig::new("/x").with_completion_phrase("");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        let config = MonitorConfig::new("/x").with_pool_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
