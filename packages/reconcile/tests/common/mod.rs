#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lifecycle_core::MonitorConfig;
use reconcile::{LiveQueueSource, RunOptions};
use tempfile::TempDir;

pub const HEADER: &str = "\
universe = vanilla
executable = run_looper.sh
getenv = true

";

/// Submitted at 10:00, running from 10:05, terminated at 11:05.
pub const FINISHED: &str = "\
000 (7.000.000) 03/01 10:00:00 Job submitted from host: <10.0.0.1:9618>
...
001 (7.000.000) 03/01 10:05:00 Job executing on host: <10.0.0.2:9618>
...
005 (7.000.000) 03/01 11:05:00 Job terminated.
\t(1) Normal termination (return value 0)
\t   Disk (KB)            :    51200   100000    120000
\t   Memory (MB)          :      293     2048      2048
...
";

pub const EVICTED_THEN_FINISHED: &str = "\
000 (8.000.000) 03/01 10:00:00 Job submitted from host: <10.0.0.1:9618>
...
001 (8.000.000) 03/01 10:10:00 Job executing on host: <10.0.0.3:9618>
...
004 (8.000.000) 03/01 10:40:00 Job was evicted.
...
000 (8.000.000) 03/01 10:41:00 Job submitted from host: <10.0.0.1:9618>
...
001 (8.000.000) 03/01 10:50:00 Job executing on host: <10.0.0.4:9618>
...
005 (8.000.000) 03/01 12:00:00 Job terminated.
\t(1) Normal termination (return value 0)
...
";

pub const ABORTED_THEN_RELAUNCHED: &str = "\
000 (9.000.000) 03/01 10:00:00 Job submitted from host: <10.0.0.1:9618>
...
001 (9.000.000) 03/01 10:02:00 Job executing on host: <10.0.0.5:9618>
...
009 (9.000.000) 03/01 10:30:00 Job was aborted.
...
000 (9.000.000) 03/01 10:31:00 Job submitted from host: <10.0.0.1:9618>
...
001 (9.000.000) 03/01 10:35:00 Job executing on host: <10.0.0.5:9618>
...
005 (9.000.000) 03/01 11:00:00 Job terminated.
\t(1) Normal termination (return value 0)
...
";

pub const STILL_RUNNING: &str = "\
000 (11.000.000) 03/01 10:00:00 Job submitted from host: <10.0.0.1:9618>
...
001 (11.000.000) 03/01 10:20:00 Job executing on host: <10.0.0.6:9618>
...
";

pub const UNKNOWN_CODE: &str = "\
000 (12.000.000) 03/01 10:00:00 Job submitted from host: <10.0.0.1:9618>
...
099 (12.000.000) 03/01 10:01:00 Something new
...
";

pub const DONE_STDOUT: &str = "\
Looper events processed: 120000
Speed [kHz]: 1.5
Time: Real 0:55:00
Done.
";

/// A scratch batch directory with logs, a submission script and a place
/// for reports.
pub struct Batch {
    dir: TempDir,
    script: String,
}

impl Batch {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("logs"))?;
        Ok(Self {
            dir,
            script: HEADER.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn logs(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.logs().join(format!("{name}.log"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("resubmit.sub")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.dir.path().join("reports")
    }

    /// Write one job's files and add its block to the submission script.
    pub fn job(&mut self, name: &str, log: &str, stdout: &str, artifact: bool) -> io::Result<()> {
        let logs = self.logs();
        fs::write(logs.join(format!("{name}.log")), log)?;
        fs::write(logs.join(format!("{name}.out")), stdout)?;
        if artifact {
            fs::write(logs.join(format!("{name}.root")), b"ntuple")?;
        }
        self.script.push_str(&format!(
            "arguments = -s {name}\nlog = {dir}/{name}.log\noutput = {dir}/{name}.out\nqueue\n\n",
            dir = logs.display()
        ));
        Ok(())
    }

    /// Result artifact with no job behind it.
    pub fn orphan_artifact(&self, name: &str) -> io::Result<()> {
        fs::write(self.logs().join(format!("{name}.root")), b"ntuple")
    }

    pub fn write_script(&self) -> io::Result<PathBuf> {
        let path = self.dir.path().join("submit.sub");
        fs::write(&path, &self.script)?;
        Ok(path)
    }

    /// Saved queue listing naming the stdout files of `names`.
    pub fn live_listing(&self, names: &[&str]) -> io::Result<PathBuf> {
        let path = self.dir.path().join("queue.txt");
        let mut text = String::from("undefined\n/home/someone/else.out\n");
        for name in names {
            text.push_str(&format!("{}\n", self.logs().join(format!("{name}.out")).display()));
        }
        fs::write(&path, text)?;
        Ok(path)
    }

    pub fn config(&self) -> MonitorConfig {
        MonitorConfig::new(self.logs())
            .with_reference_year(2024)
            .with_pool_size(2)
    }

    pub fn options(&self, live_queue: LiveQueueSource) -> io::Result<RunOptions> {
        Ok(RunOptions {
            submit_script: Some(self.write_script()?),
            output: Some(self.manifest_path()),
            report_dir: Some(self.report_dir()),
            live_queue,
            ..RunOptions::default()
        })
    }
}

/// The standard four-job batch: one of each classification.
pub fn mixed_batch() -> io::Result<Batch> {
    let mut batch = Batch::new()?;
    batch.job("ttbar", FINISHED, DONE_STDOUT, true)?;
    batch.job("wjets", EVICTED_THEN_FINISHED, "Looper events processed: 40\n", false)?;
    batch.job("stop", ABORTED_THEN_RELAUNCHED, DONE_STDOUT, false)?;
    batch.job("zjets", STILL_RUNNING, "", false)?;
    Ok(batch)
}
