//! Start a scan queue with its worker pool and wait for it to drain.

use std::sync::Arc;

use lifecycle_core::{JobFiles, RunId};
use ractor::Actor;

use crate::handler::JobHandler;
use crate::messages::{PoolError, ScanQueueMessage, ScanResults};
use crate::queue_actor::{ScanQueueActor, ScanQueueState};
use crate::worker_actor::{ScanWorkerActor, WorkerArgs};

/// Scan every job on a pool of at most `pool_size` workers.
///
/// Returns once each job has either an analysis or a failure; per-job errors
/// never fail the pool as a whole.
pub async fn run_scan(
    run_id: RunId,
    jobs: Vec<JobFiles>,
    handler: Arc<dyn JobHandler>,
    pool_size: usize,
) -> Result<ScanResults, PoolError> {
    let workers = pool_size.clamp(1, jobs.len().max(1));
    let (queue, queue_handle) = Actor::spawn(
        Some(format!("scan-queue-{}", run_id)),
        ScanQueueActor,
        ScanQueueState::new(run_id, jobs),
    )
    .await
    .map_err(|e| PoolError::Spawn {
        what: "scan queue",
        reason: e.to_string(),
    })?;

    for index in 0..workers {
        let args = WorkerArgs {
            worker_id: format!("worker-{}", index + 1),
            queue: queue.clone(),
            handler: handler.clone(),
        };
        if let Err(e) = Actor::spawn_linked(None, ScanWorkerActor, args, queue.get_cell()).await {
            queue.stop(None);
            return Err(PoolError::Spawn {
                what: "scan worker",
                reason: e.to_string(),
            });
        }
    }
    tracing::info!("Scanning with {} workers", workers);

    let (tx, rx) = ractor::concurrency::oneshot();
    queue
        .send_message(ScanQueueMessage::AwaitDrained { reply: tx.into() })
        .map_err(|e| PoolError::Queue(e.to_string()))?;
    let results = rx.await.map_err(|_| PoolError::QueueStopped)?;

    queue.stop(None);
    let _ = queue_handle.await;
    Ok(results)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use crate::handler::{FnHandler, HandlerFuture};
    use scan::JobError;

    fn jobs(n: usize) -> Vec<JobFiles> {
        (0..n)
            .map(|i| {
                let id = format!("job{:03}", i);
                JobFiles::new(id.as_str().into(), format!("{id}.log"), format!("{id}.out"))
            })
            .collect()
    }

    fn failing_handler() -> Arc<dyn JobHandler> {
        Arc::new(FnHandler::new(|job: &JobFiles| -> HandlerFuture {
            let identity = job.identity.clone();
            Box::pin(async move { Err(JobError::Worker(format!("cannot scan {identity}"))) })
        }))
    }

    #[tokio::test]
    async fn every_job_gets_an_outcome() {
        let results = run_scan(RunId::new(), jobs(250), failing_handler(), 4)
            .await
            .unwrap();
        assert_eq!(results.len(), 250);
        assert!(results.analyses.is_empty());
        assert_eq!(results.failures[0].identity.as_str(), "job000");
        assert_eq!(results.failures[249].identity.as_str(), "job249");
    }

    #[tokio::test]
    async fn empty_job_list_drains_immediately() {
        let results = run_scan(RunId::new(), Vec::new(), failing_handler(), 8)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn panicking_worker_fails_only_its_job() {
        let handler: Arc<dyn JobHandler> = Arc::new(FnHandler::new(|job: &JobFiles| -> HandlerFuture {
            let identity = job.identity.clone();
            Box::pin(async move {
                if identity.as_str() == "job003" {
                    panic!("scanner blew up");
                }
                Err(JobError::Worker("skipped".into()))
            })
        }));

        let results = run_scan(RunId::new(), jobs(20), handler, 2).await.unwrap();
        assert_eq!(results.len(), 20);
        let blown = results
            .failures
            .iter()
            .find(|f| f.identity.as_str() == "job003")
            .unwrap();
        assert!(!matches!(&blown.error, JobError::Worker(msg) if msg == "skipped"));
    }
}
