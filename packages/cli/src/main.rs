//! `job-reconcile`: scan a batch of scheduler jobs, classify them, and build
//! the script that resubmits the ones that need another run.
//!
//! # Usage
//!
//! ```bash
//! # Report and plan only
//! job-reconcile --log-dir logs/ --submit-script submit.sub
//!
//! # Clear the failed jobs' files and submit them again
//! job-reconcile --log-dir logs/ --submit-script submit.sub --confirm
//! ```

use std::process::ExitCode;

use clap::Parser;

mod args;
mod config;
mod error;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    match run::execute(&cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            tracing::error!("{}", e);
            e.exit_code()
        }
    }
}
