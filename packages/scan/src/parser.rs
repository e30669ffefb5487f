//! Scheduler event log parser.
//!
//! An event record is a line of the form
//! `005 (856768.001.000) 01/15 16:26:21 Job terminated.`: a three-digit code,
//! the cluster id in parentheses, a timestamp and free text. Newer scheduler
//! versions write `2024-01-15 16:26:21` instead, which carries its own year.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use lifecycle_core::{
    EventKind, IGNORED_EVENT_CODES, JobIdentity, JobTimeline, LifecycleEvent, TimelineError,
    YearBasis,
};
use regex::Regex;

static EVENT_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{3}) \((\d+\.\d+\.\d+)\) (\S+) (\S+)").expect("event record pattern is valid")
});

/// A scheduler log that cannot be turned into a timeline.
#[derive(Debug, thiserror::Error)]
pub enum MalformedLogError {
    #[error("Unknown event code {code:03} in {}:{line}: {text}", .path.display())]
    UnknownEventCode {
        path: PathBuf,
        line: usize,
        code: u16,
        text: String,
    },

    #[error("Invalid timestamp in {}:{line}: {text}", .path.display())]
    BadTimestamp {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error(
        "02/29 in {}:{line} does not exist in {year}; set the reference year to the year the log was written",
        .path.display()
    )]
    LeapDay {
        path: PathBuf,
        line: usize,
        year: i32,
    },

    #[error("Malformed timeline in {}: {source}", .path.display())]
    Timeline {
        path: PathBuf,
        #[source]
        source: TimelineError,
    },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether a line has the shape of an event record, whatever its code.
pub fn is_event_record(line: &str) -> bool {
    EVENT_RECORD.is_match(line)
}

/// Parses scheduler logs into timelines.
#[derive(Debug, Clone, Copy)]
pub struct EventLogParser {
    reference_year: i32,
}

impl EventLogParser {
    /// Create a parser assuming `reference_year` for timestamps without a year.
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    /// Create a parser assuming the current local year.
    pub fn current_year() -> Self {
        Self::new(chrono::Local::now().year())
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Parse the log file at `path`.
    pub fn parse_file(
        &self,
        path: &Path,
        identity: JobIdentity,
    ) -> Result<JobTimeline, MalformedLogError> {
        let file = File::open(path).map_err(|source| MalformedLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(BufReader::new(file), path, identity)
    }

    /// Parse a log from any reader. `source` is only used in error messages.
    pub fn parse<R: BufRead>(
        &self,
        reader: R,
        source: &Path,
        identity: JobIdentity,
    ) -> Result<JobTimeline, MalformedLogError> {
        let mut years = YearTracker::new(self.reference_year);
        let mut events = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|source_err| MalformedLogError::Io {
                path: source.to_path_buf(),
                source: source_err,
            })?;
            let Some(caps) = EVENT_RECORD.captures(&line) else {
                continue;
            };

            // Three ASCII digits always fit.
            let code: u16 = caps[1].parse().unwrap_or(u16::MAX);
            if IGNORED_EVENT_CODES.contains(&code) {
                continue;
            }
            let kind = EventKind::from_code(code).ok_or_else(|| {
                MalformedLogError::UnknownEventCode {
                    path: source.to_path_buf(),
                    line: line_no,
                    code,
                    text: line.trim_end().to_string(),
                }
            })?;

            let rollovers_before = years.rollovers;
            let timestamp = years.resolve(&caps[3], &caps[4]).ok_or_else(|| {
                if caps[3].starts_with("02/29") {
                    MalformedLogError::LeapDay {
                        path: source.to_path_buf(),
                        line: line_no,
                        year: years.year,
                    }
                } else {
                    MalformedLogError::BadTimestamp {
                        path: source.to_path_buf(),
                        line: line_no,
                        text: line.trim_end().to_string(),
                    }
                }
            })?;
            if years.rollovers > rollovers_before {
                tracing::warn!(
                    "{}: timestamps cross a year boundary at line {}; assuming {}",
                    identity,
                    line_no,
                    timestamp.year()
                );
            }

            events.push(LifecycleEvent::new(kind, timestamp, line_no));
        }

        tracing::debug!("Parsed {} events for {}", events.len(), identity);

        JobTimeline::new(identity, events, years.basis()).map_err(|err| {
            MalformedLogError::Timeline {
                path: source.to_path_buf(),
                source: err,
            }
        })
    }
}

impl Default for EventLogParser {
    fn default() -> Self {
        Self::current_year()
    }
}

/// Tracks the assumed year across yearless timestamps of one log.
struct YearTracker {
    initial_year: i32,
    year: i32,
    previous_month: Option<u32>,
    rollovers: u32,
    inferred: bool,
}

impl YearTracker {
    fn new(year: i32) -> Self {
        Self {
            initial_year: year,
            year,
            previous_month: None,
            rollovers: 0,
            inferred: false,
        }
    }

    fn resolve(&mut self, date: &str, time: &str) -> Option<NaiveDateTime> {
        let date = if date.contains('-') {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            self.year = date.year();
            date
        } else {
            let (month, day) = date.split_once('/')?;
            let month: u32 = month.parse().ok()?;
            let day: u32 = day.parse().ok()?;
            if self.previous_month.is_some_and(|previous| month < previous) {
                self.year += 1;
                self.rollovers += 1;
            }
            self.inferred = true;
            NaiveDate::from_ymd_opt(self.year, month, day)?
        };
        self.previous_month = Some(date.month());

        // Drop fractional seconds and any zone suffix.
        let time = time.get(..8)?;
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
        Some(date.and_time(time))
    }

    fn basis(&self) -> YearBasis {
        if self.inferred {
            YearBasis::Assumed {
                year: self.initial_year,
                rollovers: self.rollovers,
            }
        } else {
            YearBasis::Explicit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
000 (856768.001.000) 01/15 16:13:06 Job submitted from host: <10.0.0.1:9618>
...
006 (856768.001.000) 01/15 16:20:00 Image size of job updated: 1000
\t1  -  MemoryUsage of job (MB)
...
001 (856768.001.000) 01/15 16:14:10 Job executing on host: <10.0.0.2:9618>
...
028 (856768.001.000) 01/15 16:14:11 Job ad information event triggered.
...
005 (856768.001.000) 01/15 17:00:00 Job terminated.
\t(1) Normal termination (return value 0)
...
";

    fn parse(text: &str) -> Result<JobTimeline, MalformedLogError> {
        EventLogParser::new(2024).parse(text.as_bytes(), Path::new("job.log"), "job".into())
    }

    #[test]
    fn parses_events_and_skips_ignored_codes() {
        let timeline = parse(LOG).unwrap();
        let kinds: Vec<_> = timeline.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Submitted, EventKind::Executing, EventKind::Terminated]
        );
        assert_eq!(timeline.first().line, 1);
        assert_eq!(
            timeline.first().timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(16, 13, 6)
                .unwrap()
        );
        assert_eq!(
            timeline.year_basis(),
            YearBasis::Assumed {
                year: 2024,
                rollovers: 0
            }
        );
    }

    #[test]
    fn unknown_code_names_file_and_line() {
        let text = "000 (1.0.0) 01/15 16:13:06 Job submitted\n\
                    077 (1.0.0) 01/15 16:14:06 Something new\n";
        let err = parse(text).unwrap_err();
        match &err {
            MalformedLogError::UnknownEventCode { path, line, code, .. } => {
                assert_eq!(path, Path::new("job.log"));
                assert_eq!(*line, 2);
                assert_eq!(*code, 77);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("job.log:2"));
    }

    #[test]
    fn year_rolls_over_when_month_goes_back() {
        let text = "000 (1.0.0) 12/31 23:59:00 Job submitted\n\
                    001 (1.0.0) 01/01 00:01:00 Job executing\n";
        let timeline = parse(text).unwrap();
        assert_eq!(timeline.last().timestamp.year(), 2025);
        assert_eq!(timeline.total_secs(), 120);
        assert!(timeline.year_basis().spans_year_boundary());
    }

    #[test]
    fn iso_timestamps_carry_their_year() {
        let text = "000 (1.0.0) 2023-12-31 23:59:00 Job submitted\n\
                    001 (1.0.0) 2024-01-01 00:00:30.250 Job executing\n";
        let timeline = parse(text).unwrap();
        assert_eq!(timeline.year_basis(), YearBasis::Explicit);
        assert_eq!(timeline.first().timestamp.year(), 2023);
        assert_eq!(timeline.total_secs(), 90);
    }

    #[test]
    fn bad_timestamp_and_empty_logs_are_malformed() {
        let err = parse("000 (1.0.0) 13/45 16:13:06 Job submitted\n").unwrap_err();
        assert!(matches!(err, MalformedLogError::BadTimestamp { line: 1, .. }));

        let err = parse("nothing to see here\n").unwrap_err();
        assert!(matches!(
            err,
            MalformedLogError::Timeline {
                source: TimelineError::Empty,
                ..
            }
        ));
    }

    #[test]
    fn leap_day_needs_a_leap_reference_year() {
        let text = "000 (1.0.0) 02/29 10:00:00 Job submitted\n";
        let err = EventLogParser::new(2023)
            .parse(text.as_bytes(), Path::new("job.log"), "job".into())
            .unwrap_err();
        assert!(matches!(err, MalformedLogError::LeapDay { line: 1, year: 2023, .. }));
        assert!(err.to_string().contains("reference year"));

        let timeline = parse(text).unwrap();
        assert_eq!(timeline.first().timestamp.day(), 29);
    }

    #[test]
    fn parse_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EventLogParser::new(2024)
            .parse_file(&dir.path().join("gone.log"), "gone".into())
            .unwrap_err();
        assert!(matches!(err, MalformedLogError::Io { .. }));
    }
}
