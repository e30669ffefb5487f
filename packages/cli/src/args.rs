use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Check a batch of scheduler jobs and build a script that resubmits the
/// ones that need another run.
#[derive(Parser, Debug)]
#[command(name = "job-reconcile")]
#[command(version)]
#[command(about = "Batch job lifecycle monitor and resubmission reconciler", long_about = None)]
pub struct Cli {
    /// Directory with every job's log, stdout and stderr
    #[arg(short = 'l', long = "log-dir")]
    pub log_dir: Option<PathBuf>,

    /// Directory with result artifacts (default: the log directory)
    #[arg(short = 'a', long = "artifact-dir")]
    pub artifact_dir: Option<PathBuf>,

    /// Original submission script to cut the resubmission manifest from
    #[arg(short = 's', long = "submit-script")]
    pub submit_script: Option<PathBuf>,

    /// Where to write the resubmission manifest (default: <log-dir>/resubmit.sub)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Directory for ranking.txt, summary.csv, summary.json and resubmit.txt
    #[arg(long = "report-dir")]
    pub report_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Text the payload prints on stdout once it has finished
    #[arg(long = "pass-phrase")]
    pub pass_phrase: Option<String>,

    /// Year assumed for timestamps without one (default: the current year).
    /// Logs with a 02/29 timestamp need a leap year here
    #[arg(long = "reference-year")]
    pub reference_year: Option<i32>,

    /// Number of parallel scan workers
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Entries per ranking
    #[arg(long = "top-n")]
    pub top_n: Option<usize>,

    /// Seconds to wait for the live queue query
    #[arg(long = "scheduler-timeout")]
    pub scheduler_timeout: Option<u64>,

    /// Do not query the live queue; active jobs are not verified
    #[arg(long = "no-live-query")]
    pub no_live_query: bool,

    /// Read the live queue from a file instead of the scheduler
    #[arg(long = "live-queue-file", conflicts_with = "no_live_query")]
    pub live_queue_file: Option<PathBuf>,

    /// Resubmit everything not complete, skipping every consistency check
    #[arg(long = "dumb")]
    pub dumb: bool,

    /// Clear the resubmitted jobs' files and submit the manifest
    #[arg(long = "confirm")]
    pub confirm: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "job-reconcile",
            "--log-dir",
            "/batch/logs",
            "--submit-script",
            "submit.sub",
            "--pass-phrase",
            "Ana    Done.",
            "--jobs",
            "8",
            "--live-queue-file",
            "queue.txt",
            "--confirm",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.log_dir, Some(PathBuf::from("/batch/logs")));
        assert_eq!(cli.pass_phrase.as_deref(), Some("Ana    Done."));
        assert_eq!(cli.jobs, Some(8));
        assert!(cli.confirm && !cli.dumb);
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
    }

    #[test]
    fn live_queue_file_conflicts_with_no_live_query() {
        let result = Cli::try_parse_from([
            "job-reconcile",
            "--no-live-query",
            "--live-queue-file",
            "queue.txt",
        ]);
        assert!(result.is_err());
    }
}
