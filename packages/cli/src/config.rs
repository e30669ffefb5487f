//! Config layering: JSON file, then environment, then flags.

use lifecycle_core::{ConfigError, MonitorConfig};
use reconcile::{ApplyMode, LiveQueueSource, RunOptions};

use crate::args::Cli;

/// Build the monitor config for this invocation.
pub fn resolve(cli: &Cli) -> Result<MonitorConfig, ConfigError> {
    let config = match &cli.config {
        Some(path) => MonitorConfig::from_json_file(path)?,
        None => MonitorConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    if let Some(dir) = &cli.artifact_dir {
        config = config.with_artifact_dir(dir);
    }
    if let Some(phrase) = &cli.pass_phrase {
        config = config.with_completion_phrase(phrase);
    }
    if let Some(year) = cli.reference_year {
        config = config.with_reference_year(year);
    }
    if let Some(jobs) = cli.jobs {
        config = config.with_pool_size(jobs);
    }
    if let Some(top_n) = cli.top_n {
        config.report.top_n = top_n;
    }
    if let Some(secs) = cli.scheduler_timeout {
        config.scheduler.timeout_secs = secs;
    }
    if cli.no_live_query {
        config.scheduler.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

pub fn run_options(cli: &Cli) -> RunOptions {
    let live_queue = match (&cli.live_queue_file, cli.no_live_query) {
        (Some(path), _) => LiveQueueSource::File(path.clone()),
        (None, true) => LiveQueueSource::Disabled,
        (None, false) => LiveQueueSource::Scheduler,
    };
    RunOptions {
        submit_script: cli.submit_script.clone(),
        output: cli.output.clone(),
        report_dir: cli.report_dir.clone(),
        live_queue,
        dumb: cli.dumb,
        apply: if cli.confirm {
            ApplyMode::Confirmed
        } else {
            ApplyMode::DryRun
        },
    }
}
