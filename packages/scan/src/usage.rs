//! Resource usage from the terminal section of a scheduler log.
//!
//! The section following the last `005` record looks like
//!
//! ```text
//! 005 (856768.001.000) 01/15 17:00:00 Job terminated.
//!     (1) Normal termination (return value 0)
//!     ...
//!     Partitionable Resources :    Usage  Request Allocated
//!        Disk (KB)            :   389513        1  40181230
//!        Memory (MB)          :      293     1024      1024
//! ...
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use lifecycle_core::{EventKind, ResourceUsage, Termination};
use regex::Regex;

use crate::parser::is_event_record;

static TERMINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Normal|Abnormal) termination \((?:return value|signal) (-?\d+)\)")
        .expect("termination pattern is valid")
});

static RESOURCE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(Disk|Memory) \((KB|MB)\)\s*:\s*(.*)$").expect("resource pattern is valid")
});

/// Read the resource usage of the log at `path`.
pub fn extract_usage_file(path: &Path) -> std::io::Result<ResourceUsage> {
    let file = File::open(path)?;
    extract_usage(BufReader::new(file))
}

/// Read the resource usage of the last termination section in a log.
///
/// A log without a termination section yields an empty usage.
pub fn extract_usage<R: BufRead>(reader: R) -> std::io::Result<ResourceUsage> {
    let terminated = format!("{:03} ", EventKind::Terminated.code());
    let mut usage = ResourceUsage::default();
    let mut in_section = false;

    for line in reader.lines() {
        let line = line?;
        if is_event_record(&line) {
            in_section = line.starts_with(&terminated);
            if in_section {
                usage = ResourceUsage::default();
            }
            continue;
        }
        if !in_section {
            continue;
        }
        if line.trim() == "..." {
            in_section = false;
            continue;
        }

        if let Some(caps) = TERMINATION.captures(&line) {
            let value: i32 = caps[2].parse().unwrap_or(-1);
            usage.termination = Some(if &caps[1] == "Normal" {
                Termination::Normal {
                    return_value: value,
                }
            } else {
                Termination::Abnormal { signal: value }
            });
        } else if let Some(caps) = RESOURCE_ROW.captures(&line) {
            let Some((used, allocated)) = used_and_allocated(&caps[3]) else {
                continue;
            };
            let (used, allocated) = if &caps[2] == "KB" {
                (kb_to_mb(used), kb_to_mb(allocated))
            } else {
                (used, allocated)
            };
            if &caps[1] == "Disk" {
                usage.disk_used_mb = Some(used);
                usage.disk_allocated_mb = Some(allocated);
            } else {
                usage.memory_used_mb = Some(used);
                usage.memory_allocated_mb = Some(allocated);
            }
        }
    }

    Ok(usage)
}

/// First and last numeric column of a `Usage Request Allocated` row.
fn used_and_allocated(columns: &str) -> Option<(u64, u64)> {
    let values: Vec<u64> = columns
        .split_whitespace()
        .map(|v| v.parse().ok())
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [used, .., allocated] => Some((*used, *allocated)),
        _ => None,
    }
}

fn kb_to_mb(kb: u64) -> u64 {
    (kb + 500) / 1000
}
