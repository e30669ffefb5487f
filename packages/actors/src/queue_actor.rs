//! Scan queue actor: hands out jobs and collects their outcomes.

use std::collections::{HashMap, VecDeque};

use lifecycle_core::{JobFiles, JobIdentity, RunId};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use scan::JobError;

use crate::messages::{JobFailure, ScanQueueMessage, ScanResults};

const PROGRESS_EVERY: usize = 100;

/// State for the scan queue actor.
pub struct ScanQueueState {
    run_id: RunId,
    total: usize,
    /// Jobs not yet handed to a worker.
    pending: VecDeque<JobFiles>,
    /// Job each worker is currently scanning.
    in_flight: HashMap<ActorId, JobIdentity>,
    results: ScanResults,
    live_workers: usize,
    waiter: Option<RpcReplyPort<ScanResults>>,
}

impl ScanQueueState {
    /// Create the queue state for one run.
    pub fn new(run_id: RunId, jobs: Vec<JobFiles>) -> Self {
        Self {
            run_id,
            total: jobs.len(),
            pending: jobs.into(),
            in_flight: HashMap::new(),
            results: ScanResults::default(),
            live_workers: 0,
            waiter: None,
        }
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    fn record_failure(&mut self, identity: JobIdentity, error: JobError) {
        tracing::warn!("Scan of {} failed: {}", identity, error);
        self.results.failures.push(JobFailure { identity, error });
        self.log_progress();
    }

    fn log_progress(&self) {
        let done = self.results.len();
        if done % PROGRESS_EVERY == 0 || done == self.total {
            tracing::info!("Scanned {}/{} jobs", done, self.total);
        }
    }

    /// Reply to the waiter once the last outcome is in.
    fn finish_if_drained(&mut self) {
        if !self.is_drained() {
            return;
        }
        if let Some(waiter) = self.waiter.take() {
            let mut results = std::mem::take(&mut self.results);
            results.sort();
            tracing::info!(
                "Scan queue for run {} drained: {} analysed, {} failed",
                self.run_id,
                results.analyses.len(),
                results.failures.len()
            );
            let _ = waiter.send(results);
        }
    }

    fn worker_gone(&mut self, worker: ActorId, reason: String) {
        self.live_workers = self.live_workers.saturating_sub(1);
        if let Some(identity) = self.in_flight.remove(&worker) {
            self.record_failure(identity, JobError::Worker(reason));
        }
        if self.live_workers == 0 && !self.pending.is_empty() {
            tracing::warn!(
                "No scan workers left; {} jobs were never scanned",
                self.pending.len()
            );
            while let Some(job) = self.pending.pop_front() {
                self.record_failure(job.identity, JobError::Worker("no scan workers left".into()));
            }
        }
        self.finish_if_drained();
    }
}

/// Queue actor that owns the pending jobs of one scan.
///
/// Workers are spawned linked to this actor, so a worker that dies is
/// reported here and its in-flight job becomes a failure.
pub struct ScanQueueActor;

impl Actor for ScanQueueActor {
    type Msg = ScanQueueMessage;
    type State = ScanQueueState;
    type Arguments = ScanQueueState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting scan queue for run {}: {} jobs", args.run_id, args.total);
        Ok(args)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ScanQueueMessage::RequestJob { worker, reply } => {
                let job = state.pending.pop_front();
                if let Some(job) = &job {
                    state.in_flight.insert(worker, job.identity.clone());
                }
                let _ = reply.send(job);
            }

            ScanQueueMessage::JobScanned {
                worker,
                identity,
                result,
            } => {
                state.in_flight.remove(&worker);
                match *result {
                    Ok(analysis) => {
                        tracing::debug!("Scanned {}", identity);
                        state.results.analyses.push(analysis);
                        state.log_progress();
                    }
                    Err(error) => state.record_failure(identity, error),
                }
                state.finish_if_drained();
            }

            ScanQueueMessage::AwaitDrained { reply } => {
                state.waiter = Some(reply);
                state.finish_if_drained();
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorStarted(_) => {
                state.live_workers += 1;
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let reason = reason.unwrap_or_else(|| "worker stopped".into());
                state.worker_gone(cell.get_id(), reason);
            }
            SupervisionEvent::ActorFailed(cell, err) => {
                tracing::warn!("Scan worker {} failed: {}", cell.get_id(), err);
                state.worker_gone(cell.get_id(), err.to_string());
            }
            _ => {}
        }
        Ok(())
    }
}
