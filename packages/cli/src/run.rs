use std::fmt::Write;

use reconcile::{ApplyOutcome, RunReport};

use crate::args::Cli;
use crate::config::{resolve, run_options};
use crate::error::{RunError, RunStatus};

pub async fn execute(cli: &Cli) -> Result<RunStatus, RunError> {
    let config = resolve(cli)?;
    let options = run_options(cli);
    let report = reconcile::run(config, options).await?;

    print!("{}", render(&report));
    Ok(if report.is_partial() {
        RunStatus::Partial
    } else {
        RunStatus::Success
    })
}

/// Console report for a finished run.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&report.ranking_text);
    let _ = writeln!(out);

    for summary in &report.transitions {
        let _ = writeln!(out, "Transition anomaly {summary}");
    }
    for job in report.unprocessed() {
        let _ = writeln!(out, "Unprocessed {}: {}", job.identity, job.error);
    }
    for warning in report.warnings() {
        let _ = writeln!(out, "Warning: {warning}");
    }

    let _ = writeln!(out, "Run {}: {}", report.run_id, report.summary.headline());
    for path in &report.report_files {
        let _ = writeln!(out, "Wrote {}", path.display());
    }
    if let Some(path) = &report.manifest_path {
        let _ = writeln!(out, "Wrote {}", path.display());
    }

    match &report.apply {
        Some(ApplyOutcome::Planned(plan)) => out.push_str(&plan.render()),
        Some(ApplyOutcome::AlreadyApplied { marker }) => {
            let _ = writeln!(out, "Already submitted (see {})", marker.display());
        }
        Some(ApplyOutcome::NothingToSubmit) => {
            let _ = writeln!(out, "Nothing to resubmit.");
        }
        Some(ApplyOutcome::Submitted { cleared, output }) => {
            let _ = writeln!(out, "Cleared {cleared} files.");
            out.push_str(output);
        }
        None => {}
    }
    out
}
