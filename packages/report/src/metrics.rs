//! Per-job metrics shown in rankings and the CSV table.

use lifecycle_core::DurationState;
use scan::JobAnalysis;

/// One measurable quantity of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalTime,
    StateTime(DurationState),
    LoopTime,
    LoopRate,
    EventsProcessed,
    DiskUsed,
    DiskAllocated,
    MemoryUsed,
    MemoryAllocated,
}

impl Metric {
    /// Every metric, in report order.
    pub fn catalog() -> Vec<Metric> {
        let mut metrics = vec![Metric::TotalTime];
        metrics.extend(DurationState::ALL.into_iter().map(Metric::StateTime));
        metrics.extend([
            Metric::LoopTime,
            Metric::LoopRate,
            Metric::EventsProcessed,
            Metric::DiskUsed,
            Metric::DiskAllocated,
            Metric::MemoryUsed,
            Metric::MemoryAllocated,
        ]);
        metrics
    }

    pub fn title(self) -> String {
        match self {
            Metric::TotalTime => "Total Time".into(),
            Metric::StateTime(state) => format!("Time {}", state.as_str().replace('_', " ")),
            Metric::LoopTime => "Looper Time".into(),
            Metric::LoopRate => "Looper Rate [Events/s]".into(),
            Metric::EventsProcessed => "Events Processed".into(),
            Metric::DiskUsed => "Disk Usage [MB]".into(),
            Metric::DiskAllocated => "Disk Allocated [MB]".into(),
            Metric::MemoryUsed => "Memory Usage [MB]".into(),
            Metric::MemoryAllocated => "Memory Allocated [MB]".into(),
        }
    }

    pub fn value(self, analysis: &JobAnalysis) -> Option<MetricValue> {
        let throughput = &analysis.outcome.throughput;
        let usage = &analysis.usage;
        match self {
            Metric::TotalTime => Some(MetricValue::Seconds(analysis.durations.total_secs)),
            Metric::StateTime(state) => Some(MetricValue::Seconds(analysis.durations.get(state))),
            Metric::LoopTime => throughput.loop_secs.map(MetricValue::Seconds),
            Metric::LoopRate => throughput.rate_hz.map(MetricValue::Rate),
            Metric::EventsProcessed => throughput.events_processed.map(MetricValue::Count),
            Metric::DiskUsed => usage.disk_used_mb.map(MetricValue::Megabytes),
            Metric::DiskAllocated => usage.disk_allocated_mb.map(MetricValue::Megabytes),
            Metric::MemoryUsed => usage.memory_used_mb.map(MetricValue::Megabytes),
            Metric::MemoryAllocated => usage.memory_allocated_mb.map(MetricValue::Megabytes),
        }
    }
}

/// A metric reading with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Seconds(i64),
    Rate(f64),
    Count(u64),
    Megabytes(u64),
}

impl MetricValue {
    /// Numeric value used for ordering.
    pub fn magnitude(self) -> f64 {
        match self {
            MetricValue::Seconds(s) => s as f64,
            MetricValue::Rate(r) => r,
            MetricValue::Count(n) | MetricValue::Megabytes(n) => n as f64,
        }
    }

    /// Value as written to the CSV table: times in hours, three decimals.
    pub fn csv_cell(self) -> String {
        match self {
            MetricValue::Seconds(s) => hours(s),
            MetricValue::Rate(r) => format!("{r:.1}"),
            MetricValue::Count(n) | MetricValue::Megabytes(n) => n.to_string(),
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Seconds(s) => f.write_str(&hms(*s)),
            MetricValue::Rate(r) => write!(f, "{r:.1}"),
            MetricValue::Count(n) | MetricValue::Megabytes(n) => write!(f, "{n}"),
        }
    }
}

/// Seconds as `H:MM:SS`.
pub fn hms(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    format!("{sign}{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Seconds as hours rounded to three decimals.
pub fn hours(secs: i64) -> String {
    format!("{:.3}", secs as f64 / 3600.0)
}
