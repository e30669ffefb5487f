//! One-row-per-job CSV export.

use std::collections::BTreeMap;
use std::fmt::Write;

use lifecycle_core::{Classification, DurationState, JobIdentity};
use scan::JobAnalysis;

use crate::metrics::Metric;

/// Column names, in order.
pub fn csv_header() -> Vec<String> {
    let mut columns = vec![
        "job".to_string(),
        "classification".to_string(),
        "total_hrs".to_string(),
    ];
    columns.extend(
        DurationState::ALL
            .into_iter()
            .map(|state| format!("{}_hrs", state.as_str())),
    );
    columns.extend(
        [
            "loop_hrs",
            "loop_rate_hz",
            "events_processed",
            "disk_used_mb",
            "disk_allocated_mb",
            "memory_used_mb",
            "memory_allocated_mb",
        ]
        .map(String::from),
    );
    columns
}

/// Render the table. Missing values are empty cells.
pub fn render_csv(
    analyses: &[JobAnalysis],
    classifications: &BTreeMap<JobIdentity, Classification>,
) -> String {
    let mut out = csv_header().join(",");
    out.push('\n');

    for analysis in analyses {
        let identity = analysis.identity();
        let mut cells = vec![
            escape(identity.as_str()),
            classifications
                .get(identity)
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
        ];
        cells.extend(Metric::catalog().into_iter().map(|metric| {
            metric
                .value(analysis)
                .map(|value| value.csv_cell())
                .unwrap_or_default()
        }));
        let _ = writeln!(out, "{}", cells.join(","));
    }
    out
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{analysis, with_loop};

    #[test]
    fn header_matches_row_width() {
        let analyses = vec![with_loop(analysis("a", 5340), 3600, 10.0), analysis("b,2", 0)];
        let classes = BTreeMap::from([(JobIdentity::new("a"), Classification::Complete)]);
        let csv = render_csv(&analyses, &classes);
        let lines: Vec<&str> = csv.lines().collect();

        let width = csv_header().len();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(',').count(), width);
        assert!(lines[0].starts_with("job,classification,total_hrs,queued_hrs,running_hrs,"));
        assert!(lines[0].ends_with(",memory_used_mb,memory_allocated_mb"));

        let row: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(row.len(), width);
        assert_eq!(&row[..5], &["a", "complete", "1.500", "0.017", "1.483"]);
        assert_eq!(row[width - 7], "1.000");
        assert_eq!(row[width - 6], "10.0");
        assert_eq!(row[width - 1], "");

        assert!(lines[2].starts_with("\"b,2\",,0.017,"));
    }
}
