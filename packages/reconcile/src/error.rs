use lifecycle_core::ConfigError;
use scan::DiscoveryError;

use crate::apply::ApplyError;
use crate::classify::ReconciliationInvariantError;
use crate::manifest::ManifestError;
use crate::output::OutputError;

/// Errors that end a run. Per-job problems never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Scan pool error: {0}")]
    Pool(#[from] actors::PoolError),

    #[error("Reconciliation invariant violated: {0}")]
    Invariant(#[from] ReconciliationInvariantError),

    #[error("Submission script error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Apply failed: {0}")]
    Apply(#[from] ApplyError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}
