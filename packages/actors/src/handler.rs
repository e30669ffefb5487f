//! Job handler trait and the scan handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lifecycle_core::JobFiles;
use scan::{JobAnalysis, JobError, ScanSettings, analyze_job};

/// Result type for job handlers.
pub type HandlerResult = Result<JobAnalysis, JobError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// Implement this trait to define how a worker processes one job.
pub trait JobHandler: Send + Sync + 'static {
    /// Process a job and return the result.
    fn handle(&self, job: &JobFiles) -> HandlerFuture;
}

/// Runs the full per-job scan on tokio's blocking pool.
pub struct ScanHandler {
    settings: Arc<ScanSettings>,
}

impl ScanHandler {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl JobHandler for ScanHandler {
    fn handle(&self, job: &JobFiles) -> HandlerFuture {
        let settings = self.settings.clone();
        let job = job.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || analyze_job(&job, &settings))
                .await
                .map_err(|e| JobError::Worker(e.to_string()))?
        })
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&JobFiles) -> HandlerFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&JobFiles) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&JobFiles) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, job: &JobFiles) -> HandlerFuture {
        (self.handler)(job)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use lifecycle_core::MonitorConfig;

    #[tokio::test]
    async fn scan_handler_reports_job_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("a.log");
        let out = dir.path().join("a.out");
        std::fs::write(&log, "no events here\n").unwrap();
        std::fs::write(&out, "").unwrap();

        let handler = ScanHandler::new(ScanSettings::from_config(
            &MonitorConfig::new(dir.path()).with_reference_year(2024),
        ));
        let result = handler.handle(&JobFiles::new("a".into(), &log, &out)).await;
        assert!(matches!(result, Err(JobError::Malformed(_))));
    }
}
