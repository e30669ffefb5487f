//! Reconciliation of scanned jobs against artifacts, the live queue and the
//! original submission script.
//!
//! # Architecture
//!
//! - `context` - Per-run state: run id, config, discovered files, warnings
//! - `classify` - Set algebra over analyses and the global invariants
//! - `scheduler` - Live queue queries (`condor_q` or a saved listing)
//! - `manifest` - Cuts the submission script down to the jobs to resubmit
//! - `apply` - Clears stale job files and submits the manifest
//! - `output` - Atomic report and manifest writes
//! - `pipeline` - Runs all of the above in order
//!
//! # Usage
//!
//! ```ignore
//! use reconcile::{RunOptions, run};
//!
//! let report = run(config, RunOptions::default()).await?;
//! println!("{}", report.summary.headline());
//! ```

pub mod apply;
pub mod classify;
pub mod context;
mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod scheduler;

pub use apply::{
    AppliedMarker, ApplyError, ApplyMode, ApplyOutcome, ApplyPlan, CondorSubmit, Submitter, apply,
};
pub use classify::{
    ReconcileMode, Reconciliation, ReconciliationInvariantError, reconcile, reconcile_dumb,
};
pub use context::ReconciliationContext;
pub use error::ReconcileError;
pub use manifest::{ManifestBuilder, ManifestError, ManifestMismatch, ManifestOutcome};
pub use output::{OutputError, OutputWriter, write_atomic};
pub use pipeline::{LiveQueueSource, RunOptions, RunReport, run, run_with};
pub use scheduler::{CondorQueue, LiveQueueQuery, SchedulerQueryError, StaticQueue};
