//! Summary and ranking reports over analysed jobs.
//!
//! - `ranking` - descending top-N rankings per metric
//! - `table` - one-row-per-job CSV export
//! - `summary` - avg/min/max statistics and the JSON run summary

pub mod metrics;
pub mod ranking;
pub mod summary;
pub mod table;

pub use metrics::{Metric, MetricValue, hms, hours};
pub use ranking::{Ranking, rank, rank_all, render_rankings};
pub use summary::{RunSummary, SummaryStats, TimeStats, UnprocessedJob};
pub use table::{csv_header, render_csv};

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate};
    use lifecycle_core::{
        DurationRecord, DurationState, EventKind, JobFiles, JobTimeline, LifecycleEvent,
        PayloadOutcome, ResourceUsage, Throughput, YearBasis,
    };
    use scan::JobAnalysis;

    /// A job queued for a minute, then running for `run_secs`.
    pub fn analysis(id: &str, run_secs: i64) -> JobAnalysis {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let events = vec![
            LifecycleEvent::new(EventKind::Submitted, start, 1),
            LifecycleEvent::new(EventKind::Executing, start + Duration::seconds(60), 3),
            LifecycleEvent::new(
                EventKind::Terminated,
                start + Duration::seconds(60 + run_secs),
                5,
            ),
        ];
        let timeline = JobTimeline::new(id.into(), events, YearBasis::Explicit).unwrap();
        let mut durations = DurationRecord::new(id.into(), 60 + run_secs);
        durations.add(DurationState::Queued, 60);
        durations.add(DurationState::Running, run_secs);

        JobAnalysis {
            files: JobFiles::new(id.into(), format!("{id}.log"), format!("{id}.out")),
            timeline,
            durations,
            outcome: PayloadOutcome::default(),
            usage: ResourceUsage::default(),
        }
    }

    pub fn with_loop(mut analysis: JobAnalysis, loop_secs: i64, rate_hz: f64) -> JobAnalysis {
        analysis.outcome.throughput = Throughput {
            events_processed: Some((loop_secs as f64 * rate_hz) as u64),
            rate_hz: Some(rate_hz),
            loop_secs: Some(loop_secs),
        };
        analysis
    }

    pub fn with_memory(mut analysis: JobAnalysis, used: u64, allocated: u64) -> JobAnalysis {
        analysis.usage.memory_used_mb = Some(used);
        analysis.usage.memory_allocated_mb = Some(allocated);
        analysis
    }
}
