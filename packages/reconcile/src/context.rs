//! Per-run state shared by every reconciliation step.

use lifecycle_core::{MonitorConfig, RunId};
use scan::{Discovery, discover};

use crate::error::ReconcileError;

/// Everything one run knows before the scan starts, plus the warnings it
/// collects on the way.
#[derive(Debug)]
pub struct ReconciliationContext {
    pub run_id: RunId,
    pub config: MonitorConfig,
    pub discovery: Discovery,
    warnings: Vec<String>,
}

impl ReconciliationContext {
    /// Validate the config and discover the job files on disk.
    pub fn prepare(config: MonitorConfig) -> Result<Self, ReconcileError> {
        config.validate()?;
        let run_id = RunId::new();
        tracing::info!(
            "Run {}: monitoring {}",
            run_id,
            config.log_dir.display()
        );
        let discovery = discover(&config.log_dir, config.artifact_dir(), &config.layout)?;
        Ok(Self::with_discovery(run_id, config, discovery))
    }

    /// Build a context around an existing discovery.
    pub fn with_discovery(run_id: RunId, config: MonitorConfig, discovery: Discovery) -> Self {
        Self {
            run_id,
            config,
            discovery,
            warnings: Vec::new(),
        }
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}
