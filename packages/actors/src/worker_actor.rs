//! Worker actor that pulls jobs from the scan queue.

use std::sync::Arc;
use std::time::Duration;

use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::handler::JobHandler;
use crate::messages::{ScanQueueMessage, WorkerMessage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// State for the worker actor.
pub struct WorkerActorState {
    /// Worker name for logs.
    pub worker_id: String,
    /// Queue actor reference.
    pub queue: ActorRef<ScanQueueMessage>,
    pub handler: Arc<dyn JobHandler>,
    /// Jobs this worker has scanned.
    pub processed: usize,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<ScanQueueMessage>,
    pub handler: Arc<dyn JobHandler>,
}

/// Worker actor that scans one job at a time until the queue is empty.
pub struct ScanWorkerActor;

impl Actor for ScanWorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting worker: {}", args.worker_id);
        myself.send_message(WorkerMessage::Next)?;
        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            handler: args.handler,
            processed: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Next => {
                let worker = myself.get_id();
                let reply = ractor::rpc::call(
                    &state.queue,
                    |reply| ScanQueueMessage::RequestJob { worker, reply },
                    Some(REQUEST_TIMEOUT),
                )
                .await?;

                match reply {
                    CallResult::Success(Some(job)) => {
                        let identity = job.identity.clone();
                        let result = state.handler.handle(&job).await;
                        state.processed += 1;
                        state.queue.send_message(ScanQueueMessage::JobScanned {
                            worker,
                            identity,
                            result: Box::new(result),
                        })?;
                        myself.send_message(WorkerMessage::Next)?;
                    }
                    CallResult::Success(None) => {
                        tracing::debug!(
                            "Worker {} done after {} jobs",
                            state.worker_id,
                            state.processed
                        );
                        myself.stop(None);
                    }
                    CallResult::Timeout => {
                        return Err(ActorProcessingErr::from(format!(
                            "{} timed out waiting for the scan queue",
                            state.worker_id
                        )));
                    }
                    CallResult::SenderError => {
                        return Err(ActorProcessingErr::from(format!(
                            "Scan queue dropped the request from {}",
                            state.worker_id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
