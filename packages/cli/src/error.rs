use std::process::ExitCode;

use lifecycle_core::ConfigError;
use reconcile::ReconcileError;

/// Why the run ended without a result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl RunError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

/// Exit status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Some jobs could not be analysed.
    Partial,
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Partial => ExitCode::from(2),
        }
    }
}
