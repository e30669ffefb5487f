//! One reconciliation run, start to finish.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actors::{ScanHandler, ScanResults, run_scan};
use lifecycle_core::{JobIdentity, MonitorConfig, RunId};
use report::{RunSummary, SummaryStats, UnprocessedJob, rank_all, render_csv, render_rankings};
use scan::{JobAnalysis, JobError, ScanSettings, TransitionSummary, summarize};

use crate::apply::{ApplyMode, ApplyOutcome, ApplyPlan, CondorSubmit, Submitter, apply};
use crate::classify::{Reconciliation, reconcile, reconcile_dumb};
use crate::context::ReconciliationContext;
use crate::error::ReconcileError;
use crate::manifest::{ManifestBuilder, ManifestError, ManifestOutcome};
use crate::output::{OutputWriter, write_atomic};
use crate::scheduler::{CondorQueue, LiveQueueQuery, StaticQueue};

/// Report file names inside the report directory.
pub const RANKING_FILE: &str = "ranking.txt";
pub const CSV_FILE: &str = "summary.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const RESUBMIT_LIST_FILE: &str = "resubmit.txt";
/// Manifest name used when no output path is given.
pub const DEFAULT_MANIFEST: &str = "resubmit.sub";

/// Where the live queue comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LiveQueueSource {
    /// Ask the scheduler client.
    #[default]
    Scheduler,
    /// A saved listing, one stdout path or identity per line.
    File(PathBuf),
    Disabled,
}

/// Per-run choices that are not part of the monitor configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Original submission script; without it no manifest is built.
    pub submit_script: Option<PathBuf>,
    /// Manifest path. Defaults to `resubmit.sub` in the log directory.
    pub output: Option<PathBuf>,
    /// Report directory. Defaults to the log directory.
    pub report_dir: Option<PathBuf>,
    pub live_queue: LiveQueueSource,
    /// Skip the live query and every invariant.
    pub dumb: bool,
    pub apply: ApplyMode,
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub reconciliation: Reconciliation,
    pub summary: RunSummary,
    pub transitions: Vec<TransitionSummary>,
    /// Rankings and statistics as written to `ranking.txt`.
    pub ranking_text: String,
    pub manifest: Option<ManifestOutcome>,
    pub manifest_path: Option<PathBuf>,
    pub apply: Option<ApplyOutcome>,
    pub report_files: Vec<PathBuf>,
}

impl RunReport {
    pub fn unprocessed(&self) -> &[UnprocessedJob] {
        &self.summary.unprocessed
    }

    pub fn warnings(&self) -> &[String] {
        &self.summary.warnings
    }

    /// Some jobs could not be analysed.
    pub fn is_partial(&self) -> bool {
        !self.summary.unprocessed.is_empty()
    }
}

/// Run with the real scheduler client and submit command.
pub async fn run(config: MonitorConfig, options: RunOptions) -> Result<RunReport, ReconcileError> {
    let submitter = CondorSubmit::new(&config.submit);
    run_with(config, options, &submitter).await
}

/// Run with a caller-supplied submitter.
pub async fn run_with(
    config: MonitorConfig,
    options: RunOptions,
    submitter: &dyn Submitter,
) -> Result<RunReport, ReconcileError> {
    let mut ctx = ReconciliationContext::prepare(config)?;

    let handler = Arc::new(ScanHandler::new(ScanSettings::from_config(&ctx.config)));
    let ScanResults { analyses, failures } = run_scan(
        ctx.run_id,
        ctx.discovery.jobs.clone(),
        handler,
        ctx.config.pool_size,
    )
    .await?;

    let transitions = summarize(failures.iter().filter_map(|f| match &f.error {
        JobError::Transition(e) => Some(e),
        _ => None,
    }));
    for summary in &transitions {
        tracing::warn!("Transition anomaly {}", summary);
    }
    let unprocessed: Vec<UnprocessedJob> = failures
        .iter()
        .map(|f| {
            tracing::warn!("Could not analyse {}: {}", f.identity, f.error);
            UnprocessedJob {
                identity: f.identity.clone(),
                error: f.error.to_string(),
            }
        })
        .collect();

    let reconciliation = if options.dumb {
        ctx.warn("dumb mode: live queue and invariants not checked");
        let reconciliation = reconcile_dumb(&analyses);
        if !reconciliation.likely_running.is_empty() {
            let names: Vec<&str> = reconciliation
                .likely_running
                .iter()
                .map(|id| id.as_str())
                .collect();
            ctx.warn(format!(
                "{} jobs have empty stdout and are likely still running; not resubmitted: {}",
                names.len(),
                names.join(", ")
            ));
        }
        reconciliation
    } else {
        let live = query_live(&mut ctx, &options.live_queue).await;
        let unprocessed_ids: BTreeSet<JobIdentity> =
            unprocessed.iter().map(|u| u.identity.clone()).collect();
        let artifacts: BTreeSet<JobIdentity> = ctx
            .discovery
            .artifacts
            .difference(&unprocessed_ids)
            .cloned()
            .collect();
        reconcile(&analyses, &artifacts, live.as_ref())?
    };

    let (manifest, manifest_path) = match &options.submit_script {
        Some(script) => {
            let outcome = build_manifest(&ctx, script, &reconciliation.resubmit).await?;
            for mismatch in &outcome.mismatches {
                ctx.warn(format!("manifest: {mismatch}"));
            }
            let path = options
                .output
                .clone()
                .unwrap_or_else(|| ctx.config.log_dir.join(DEFAULT_MANIFEST));
            write_atomic(&path, &outcome.text).await?;
            tracing::info!("Wrote {} with {} jobs", path.display(), outcome.copied.len());
            (Some(outcome), Some(path))
        }
        None => (None, None),
    };

    if manifest.is_none() && options.apply == ApplyMode::Confirmed {
        ctx.warn("no submission script given; nothing applied");
    }

    let stats = SummaryStats::from_analyses(&analyses);
    let ranking_text = format!(
        "{}{}",
        render_rankings(&rank_all(&analyses, ctx.config.report.top_n)),
        stats.render()
    );
    let summary = RunSummary::new(
        ctx.run_id,
        reconciliation.mode.as_str(),
        &reconciliation.classifications,
        &reconciliation.resubmit,
    )
    .with_unprocessed(unprocessed)
    .with_warnings(ctx.take_warnings())
    .with_stats(stats);

    let report_dir = options
        .report_dir
        .clone()
        .unwrap_or_else(|| ctx.config.log_dir.clone());
    let report_files =
        write_reports(&report_dir, &analyses, &reconciliation, &summary, &ranking_text).await?;

    let apply_outcome = match (&manifest, &manifest_path) {
        (Some(outcome), Some(path)) => {
            let copied: BTreeSet<&JobIdentity> = outcome.copied.iter().collect();
            let jobs = ctx
                .discovery
                .jobs
                .iter()
                .filter(|job| copied.contains(&job.identity));
            let plan = ApplyPlan::new(path, outcome.text.clone(), jobs, &ctx.config.submit);
            Some(apply(&plan, options.apply, submitter).await?)
        }
        _ => None,
    };

    tracing::info!("Run {}: {}", ctx.run_id, summary.headline());
    Ok(RunReport {
        run_id: ctx.run_id,
        reconciliation,
        summary,
        transitions,
        ranking_text,
        manifest,
        manifest_path,
        apply: apply_outcome,
        report_files,
    })
}

/// `None` when the queue could not be read or was not asked; the active
/// check is skipped then.
async fn query_live(
    ctx: &mut ReconciliationContext,
    source: &LiveQueueSource,
) -> Option<BTreeSet<JobIdentity>> {
    let stdout_pattern = ctx.config.layout.stdout.clone();
    let query: Box<dyn LiveQueueQuery> = match source {
        LiveQueueSource::Scheduler if ctx.config.scheduler.enabled => {
            Box::new(CondorQueue::new(&ctx.config.scheduler, stdout_pattern))
        }
        LiveQueueSource::File(path) => Box::new(StaticQueue::new(path, stdout_pattern)),
        LiveQueueSource::Scheduler | LiveQueueSource::Disabled => {
            ctx.warn("live queue query disabled; active jobs not verified");
            return None;
        }
    };

    match query.live_jobs().await {
        Ok(live) => {
            tracing::info!("{} lists {} jobs", query.describe(), live.len());
            Some(live)
        }
        Err(e) => {
            ctx.warn(format!("live queue query failed; active jobs not verified: {e}"));
            None
        }
    }
}

async fn build_manifest(
    ctx: &ReconciliationContext,
    script: &Path,
    resubmit: &BTreeSet<JobIdentity>,
) -> Result<ManifestOutcome, ManifestError> {
    let text = tokio::fs::read_to_string(script)
        .await
        .map_err(|source| ManifestError::Io {
            path: script.to_path_buf(),
            source,
        })?;
    ManifestBuilder::new(&ctx.config.submit, ctx.config.layout.log.clone()).build(
        text.as_bytes(),
        script,
        resubmit,
    )
}

async fn write_reports(
    report_dir: &Path,
    analyses: &[JobAnalysis],
    reconciliation: &Reconciliation,
    summary: &RunSummary,
    ranking_text: &str,
) -> Result<Vec<PathBuf>, ReconcileError> {
    let writer = OutputWriter::new(report_dir);
    writer.init().await?;

    let resubmit_list: String = reconciliation
        .resubmit
        .iter()
        .map(|id| format!("{id}\n"))
        .collect();

    Ok(vec![
        writer.write_text(RANKING_FILE, ranking_text).await?,
        writer
            .write_text(
                CSV_FILE,
                &render_csv(analyses, &reconciliation.classifications),
            )
            .await?,
        writer.write_json(SUMMARY_FILE, summary).await?,
        writer.write_text(RESUBMIT_LIST_FILE, &resubmit_list).await?,
    ])
}
