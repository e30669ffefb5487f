//! Actor system for the parallel job scan.
//!
//! This crate provides the Ractor-based worker pool that runs the per-job
//! scan over every discovered job.
//!
//! # Architecture
//!
//! - `ScanQueueActor` - Owns the pending jobs and collects each job's outcome
//! - `ScanWorkerActor` - Pulls jobs from the queue and scans them; linked to
//!   the queue so a dead worker's job is reported as failed
//! - `run_scan` - Spawns both and waits for the queue to drain
//!
//! # Usage
//!
//! ```ignore
//! use actors::{ScanHandler, run_scan};
//!
//! let handler = Arc::new(ScanHandler::new(ScanSettings::from_config(&config)));
//! let results = run_scan(run_id, discovery.jobs.clone(), handler, config.pool_size).await?;
//! ```

mod handler;
mod messages;
mod queue_actor;
mod supervisor;
mod worker_actor;

pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, ScanHandler};
pub use messages::{JobFailure, PoolError, ScanQueueMessage, ScanResults, WorkerMessage};
pub use queue_actor::{ScanQueueActor, ScanQueueState};
pub use supervisor::run_scan;
pub use worker_actor::{ScanWorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
