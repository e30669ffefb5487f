//! Scan a job's captured stdout for the completion phrase and throughput lines.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use lifecycle_core::Throughput;
use regex::Regex;

static EVENTS_PROCESSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)events processed\s*:\s*(\d+)").expect("events pattern is valid")
});

static SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)speed\s*(?:\[\s*(k?hz)\s*\])?\s*:\s*([0-9]+(?:\.[0-9]*)?)")
        .expect("speed pattern is valid")
});

static LOOP_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)time\s*:\s*(?:real\s+)?(\d+):(\d{2}):(\d{2})").expect("time pattern is valid")
});

/// What one pass over stdout found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StdoutScan {
    pub phrase_found: bool,
    /// No non-blank content at all; the job has likely not started its payload.
    pub empty: bool,
    pub throughput: Throughput,
}

/// Scan a stdout file.
pub fn scan_stdout_file(path: &Path, phrase: &str) -> std::io::Result<StdoutScan> {
    let file = File::open(path)?;
    scan_stdout(BufReader::new(file), phrase)
}

/// Scan stdout from any reader. Later throughput lines override earlier ones.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn scan_stdout<R: BufRead>(mut reader: R, phrase: &str) -> std::io::Result<StdoutScan> {
    let mut scan = StdoutScan {
        empty: true,
        ..Default::default()
    };
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if scan.empty && !line.trim().is_empty() {
            scan.empty = false;
        }
        if !scan.phrase_found && line.contains(phrase) {
            scan.phrase_found = true;
        }
        read_throughput(&line, &mut scan.throughput);
    }

    Ok(scan)
}

fn read_throughput(line: &str, throughput: &mut Throughput) {
    if let Some(caps) = EVENTS_PROCESSED.captures(line) {
        if let Ok(n) = caps[1].parse() {
            throughput.events_processed = Some(n);
        }
    }

    if let Some(caps) = SPEED.captures(line) {
        if let Ok(rate) = caps[2].parse::<f64>() {
            let khz = caps
                .get(1)
                .is_some_and(|unit| unit.as_str().eq_ignore_ascii_case("khz"));
            throughput.rate_hz = Some(if khz { rate * 1000.0 } else { rate });
        }
    }

    if let Some(caps) = LOOP_TIME.captures(line) {
        let h: i64 = caps[1].parse().unwrap_or(0);
        let m: i64 = caps[2].parse().unwrap_or(0);
        let s: i64 = caps[3].parse().unwrap_or(0);
        throughput.loop_secs = Some(h * 3600 + m * 60 + s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "SuperflowAnaStop2L    Done.";

    #[test]
    fn finds_phrase_and_throughput() {
        let out = "\
Processing sample group.mc15_13TeV.410000
Total events processed: 152340
Analysis speed [kHz]: 2.5
Analysis time: Real 1:02:03, CPU 1:00:00
SuperflowAnaStop2L    Done.
";
        let scan = scan_stdout(out.as_bytes(), PHRASE).unwrap();
        assert!(scan.phrase_found);
        assert!(!scan.empty);
        assert_eq!(scan.throughput.events_processed, Some(152_340));
        assert_eq!(scan.throughput.rate_hz, Some(2500.0));
        assert_eq!(scan.throughput.loop_secs, Some(3723));
    }

    #[test]
    fn plain_speed_is_hz() {
        let scan = scan_stdout("speed: 812.5\n".as_bytes(), PHRASE).unwrap();
        assert_eq!(scan.throughput.rate_hz, Some(812.5));
        assert!(!scan.phrase_found);
    }

    #[test]
    fn blank_output_is_empty() {
        let scan = scan_stdout("\n   \n".as_bytes(), PHRASE).unwrap();
        assert!(scan.empty);
        assert_eq!(scan.throughput, Throughput::default());

        let scan = scan_stdout(&b""[..], PHRASE).unwrap();
        assert!(scan.empty);
    }

    #[test]
    fn phrase_must_match_exactly() {
        let scan = scan_stdout("SuperflowAnaStop2L Done.\n".as_bytes(), PHRASE).unwrap();
        assert!(!scan.phrase_found);
    }

    #[test]
    fn invalid_utf8_does_not_abort_the_scan() {
        let mut bytes = b"garbage \xff\xfe\n".to_vec();
        bytes.extend_from_slice(PHRASE.as_bytes());
        let scan = scan_stdout(bytes.as_slice(), PHRASE).unwrap();
        assert!(scan.phrase_found);
    }
}
