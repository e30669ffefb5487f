//! Message types for actor communication.

use lifecycle_core::{JobFiles, JobIdentity};
use ractor::{ActorId, RpcReplyPort};
use scan::{JobAnalysis, JobError};

use crate::handler::HandlerResult;

/// Messages for the ScanQueueActor.
#[derive(Debug)]
pub enum ScanQueueMessage {
    /// Request the next job for a worker.
    RequestJob {
        worker: ActorId,
        reply: RpcReplyPort<Option<JobFiles>>,
    },

    /// Report the outcome of one job.
    JobScanned {
        worker: ActorId,
        identity: JobIdentity,
        result: Box<HandlerResult>,
    },

    /// Reply once every job has an outcome.
    AwaitDrained { reply: RpcReplyPort<ScanResults> },
}

/// Messages for the ScanWorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Pull and scan the next job, or stop if none is left.
    Next,
}

/// A job the pool could not analyse.
#[derive(Debug)]
pub struct JobFailure {
    pub identity: JobIdentity,
    pub error: JobError,
}

/// Everything the pool produced, sorted by identity.
#[derive(Debug, Default)]
pub struct ScanResults {
    pub analyses: Vec<JobAnalysis>,
    pub failures: Vec<JobFailure>,
}

impl ScanResults {
    /// Number of jobs with an outcome, successful or not.
    pub fn len(&self) -> usize {
        self.analyses.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn sort(&mut self) {
        self.analyses
            .sort_by(|a, b| a.identity().cmp(b.identity()));
        self.failures.sort_by(|a, b| a.identity.cmp(&b.identity));
    }
}

/// Error type for pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to spawn {what}: {reason}")]
    Spawn { what: &'static str, reason: String },

    #[error("Scan queue error: {0}")]
    Queue(String),

    #[error("Scan queue stopped before all jobs were scanned")]
    QueueStopped,
}
