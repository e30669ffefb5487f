//! Set-algebra classification of analysed jobs.

use std::collections::{BTreeMap, BTreeSet};

use lifecycle_core::{Classification, JobIdentity};
use scan::JobAnalysis;

/// A global consistency check failed; nothing from this run can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconciliationInvariantError {
    #[error("{identity} is both {first} and {second}")]
    Overlap {
        identity: JobIdentity,
        first: Classification,
        second: Classification,
    },

    #[error("{} jobs have no classification: {}", .missing.len(), list(.missing))]
    Incomplete { missing: Vec<JobIdentity> },

    #[error(
        "{completed} jobs are complete but {artifacts} result artifacts exist; unexplained: {}",
        list(.unexplained)
    )]
    ArtifactCount {
        completed: usize,
        artifacts: usize,
        unexplained: Vec<JobIdentity>,
    },

    #[error(
        "active jobs disagree with the live queue; active but not queued: {}; queued but not active: {}",
        list(.active_not_queued),
        list(.queued_not_active)
    )]
    LiveQueueMismatch {
        active_not_queued: Vec<JobIdentity>,
        queued_not_active: Vec<JobIdentity>,
    },
}

fn list(ids: &[JobIdentity]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// How the resubmit set was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Set algebra with every invariant checked.
    Strict,
    /// Everything not complete is resubmitted, except jobs whose stdout
    /// is still empty; nothing is checked.
    Dumb,
}

impl ReconcileMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileMode::Strict => "strict",
            ReconcileMode::Dumb => "dumb",
        }
    }
}

/// Classification of every analysed job.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub mode: ReconcileMode,
    pub classifications: BTreeMap<JobIdentity, Classification>,
    sets: BTreeMap<Classification, BTreeSet<JobIdentity>>,
    pub resubmit: BTreeSet<JobIdentity>,
    /// Whether the active set was checked against the live queue.
    pub live_verified: bool,
    /// Live queue entries that match no analysed job.
    pub unknown_live: BTreeSet<JobIdentity>,
    /// Dumb mode only: not complete, but stdout is empty, so the job is
    /// probably still running and is left alone.
    pub likely_running: BTreeSet<JobIdentity>,
}

impl Reconciliation {
    pub fn members(&self, class: Classification) -> &BTreeSet<JobIdentity> {
        // Every class has an entry.
        &self.sets[&class]
    }

    pub fn count(&self, class: Classification) -> usize {
        self.members(class).len()
    }
}

/// The four sets before any check.
struct Sets {
    all: BTreeSet<JobIdentity>,
    complete: BTreeSet<JobIdentity>,
    failed: BTreeSet<JobIdentity>,
    aborted: BTreeSet<JobIdentity>,
    active: BTreeSet<JobIdentity>,
}

fn select(analyses: &[JobAnalysis], pred: impl Fn(&JobAnalysis) -> bool) -> BTreeSet<JobIdentity> {
    analyses
        .iter()
        .filter(|a| pred(a))
        .map(|a| a.identity().clone())
        .collect()
}

fn partition_sets(analyses: &[JobAnalysis]) -> Sets {
    let all = select(analyses, |_| true);
    let aborted = select(analyses, |a| a.timeline.was_aborted());
    let phrase = select(analyses, |a| a.outcome.completion_phrase_found);
    let ended = select(analyses, |a| a.timeline.ended_terminated());
    let artifact = select(analyses, |a| a.outcome.artifact_present);

    let normally: BTreeSet<_> = phrase.union(&ended).cloned().collect();
    let normally: BTreeSet<_> = normally.difference(&aborted).cloned().collect();
    let complete: BTreeSet<_> = normally
        .intersection(&phrase)
        .filter(|id| artifact.contains(*id))
        .cloned()
        .collect();
    let failed: BTreeSet<_> = normally.difference(&complete).cloned().collect();
    let active: BTreeSet<_> = all
        .iter()
        .filter(|id| !normally.contains(*id) && !aborted.contains(*id))
        .cloned()
        .collect();

    Sets {
        all,
        complete,
        failed,
        aborted,
        active,
    }
}

fn into_reconciliation(
    sets: Sets,
    mode: ReconcileMode,
    resubmit: BTreeSet<JobIdentity>,
) -> Reconciliation {
    let sets = BTreeMap::from([
        (Classification::Complete, sets.complete),
        (Classification::Failed, sets.failed),
        (Classification::Aborted, sets.aborted),
        (Classification::Active, sets.active),
    ]);
    let classifications = sets
        .iter()
        .flat_map(|(class, ids)| ids.iter().map(move |id| (id.clone(), *class)))
        .collect();
    Reconciliation {
        mode,
        classifications,
        sets,
        resubmit,
        live_verified: false,
        unknown_live: BTreeSet::new(),
        likely_running: BTreeSet::new(),
    }
}

/// Classify `analyses` and check every global invariant.
///
/// `artifacts` is every result artifact on disk that belongs to an analysed
/// job or to no job at all. `live` is the live queue, or `None` when it could
/// not be queried; the active check is then skipped.
pub fn reconcile(
    analyses: &[JobAnalysis],
    artifacts: &BTreeSet<JobIdentity>,
    live: Option<&BTreeSet<JobIdentity>>,
) -> Result<Reconciliation, ReconciliationInvariantError> {
    let sets = partition_sets(analyses);

    // Disjoint and covering.
    let named = [
        (Classification::Complete, &sets.complete),
        (Classification::Failed, &sets.failed),
        (Classification::Aborted, &sets.aborted),
        (Classification::Active, &sets.active),
    ];
    let mut seen: BTreeMap<&JobIdentity, Classification> = BTreeMap::new();
    for (class, ids) in named {
        for id in ids {
            if let Some(first) = seen.insert(id, class) {
                return Err(ReconciliationInvariantError::Overlap {
                    identity: id.clone(),
                    first,
                    second: class,
                });
            }
        }
    }
    let missing: Vec<_> = sets
        .all
        .iter()
        .filter(|id| !seen.contains_key(id))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ReconciliationInvariantError::Incomplete { missing });
    }

    if sets.complete.len() != artifacts.len() {
        return Err(ReconciliationInvariantError::ArtifactCount {
            completed: sets.complete.len(),
            artifacts: artifacts.len(),
            unexplained: artifacts.difference(&sets.complete).cloned().collect(),
        });
    }

    let mut unknown_live = BTreeSet::new();
    if let Some(live) = live {
        let (known, unknown): (BTreeSet<_>, BTreeSet<_>) =
            live.iter().cloned().partition(|id| sets.all.contains(id));
        if !unknown.is_empty() {
            tracing::info!(
                "Ignoring {} live jobs with no files in the monitored directory",
                unknown.len()
            );
        }
        let active_not_queued: Vec<_> = sets.active.difference(&known).cloned().collect();
        let queued_not_active: Vec<_> = known.difference(&sets.active).cloned().collect();
        if !active_not_queued.is_empty() || !queued_not_active.is_empty() {
            return Err(ReconciliationInvariantError::LiveQueueMismatch {
                active_not_queued,
                queued_not_active,
            });
        }
        unknown_live = unknown;
    }

    let resubmit = sets.failed.union(&sets.aborted).cloned().collect();
    let mut reconciliation = into_reconciliation(sets, ReconcileMode::Strict, resubmit);
    reconciliation.live_verified = live.is_some();
    reconciliation.unknown_live = unknown_live;
    Ok(reconciliation)
}

/// Classify without checks and resubmit every job that is not complete
/// and has written something to stdout.
pub fn reconcile_dumb(analyses: &[JobAnalysis]) -> Reconciliation {
    let sets = partition_sets(analyses);
    let empty = select(analyses, |a| a.outcome.stdout_empty);
    let (likely_running, resubmit): (BTreeSet<_>, BTreeSet<_>) = sets
        .all
        .difference(&sets.complete)
        .cloned()
        .partition(|id| empty.contains(id));
    let mut reconciliation = into_reconciliation(sets, ReconcileMode::Dumb, resubmit);
    reconciliation.likely_running = likely_running;
    reconciliation
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use lifecycle_core::{
        DurationRecord, EventKind, JobFiles, JobTimeline, LifecycleEvent, PayloadOutcome,
        ResourceUsage, YearBasis,
    };

    use EventKind::*;

    fn job(id: &str, kinds: &[EventKind], phrase: bool, artifact: bool) -> JobAnalysis {
        with_stdout(id, kinds, phrase, artifact, false)
    }

    fn with_stdout(
        id: &str,
        kinds: &[EventKind],
        phrase: bool,
        artifact: bool,
        stdout_empty: bool,
    ) -> JobAnalysis {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        let events: Vec<_> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| LifecycleEvent::new(*kind, start + Duration::minutes(i as i64), i + 1))
            .collect();
        let timeline = JobTimeline::new(id.into(), events, YearBasis::Explicit).unwrap();
        JobAnalysis {
            files: JobFiles::new(id.into(), format!("{id}.log"), format!("{id}.out")),
            durations: DurationRecord::new(id.into(), timeline.total_secs()),
            timeline,
            outcome: PayloadOutcome {
                completion_phrase_found: phrase,
                stdout_empty,
                artifact_present: artifact,
                ..Default::default()
            },
            usage: ResourceUsage::default(),
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<JobIdentity> {
        names.iter().map(|n| JobIdentity::new(*n)).collect()
    }

    fn population() -> Vec<JobAnalysis> {
        vec![
            job("done", &[Submitted, Executing, Terminated], true, true),
            job(
                "evicted_no_phrase",
                &[Submitted, Executing, Evicted, Submitted, Executing, Terminated],
                false,
                false,
            ),
            job("phrase_no_artifact", &[Submitted, Executing, Terminated], true, false),
            job(
                "aborted_then_relaunched",
                &[Submitted, Aborted, Submitted, Executing, Terminated],
                true,
                false,
            ),
            job("running", &[Submitted, Executing], false, false),
        ]
    }

    #[test]
    fn set_algebra_classifies_each_job_once() {
        let live = ids(&["running", "someone_else"]);
        let r = reconcile(&population(), &ids(&["done"]), Some(&live)).unwrap();

        assert_eq!(r.members(Classification::Complete), &ids(&["done"]));
        assert_eq!(
            r.members(Classification::Failed),
            &ids(&["evicted_no_phrase", "phrase_no_artifact"])
        );
        assert_eq!(
            r.members(Classification::Aborted),
            &ids(&["aborted_then_relaunched"])
        );
        assert_eq!(r.members(Classification::Active), &ids(&["running"]));
        assert_eq!(
            r.resubmit,
            ids(&["evicted_no_phrase", "phrase_no_artifact", "aborted_then_relaunched"])
        );
        assert_eq!(r.classifications.len(), 5);
        assert!(r.live_verified);
        assert_eq!(r.unknown_live, ids(&["someone_else"]));
    }

    #[test]
    fn active_job_missing_from_live_queue_is_fatal() {
        let err = reconcile(&population(), &ids(&["done"]), Some(&BTreeSet::new())).unwrap_err();
        assert_eq!(
            err,
            ReconciliationInvariantError::LiveQueueMismatch {
                active_not_queued: vec!["running".into()],
                queued_not_active: vec![],
            }
        );
    }

    #[test]
    fn queued_job_that_finished_is_fatal() {
        let err = reconcile(&population(), &ids(&["done"]), Some(&ids(&["running", "done"])))
            .unwrap_err();
        assert!(matches!(
            err,
            ReconciliationInvariantError::LiveQueueMismatch { ref queued_not_active, .. }
                if queued_not_active == &vec![JobIdentity::new("done")]
        ));
    }

    #[test]
    fn orphan_artifact_breaks_artifact_count() {
        let err = reconcile(&population(), &ids(&["done", "ghost"]), None).unwrap_err();
        assert_eq!(
            err,
            ReconciliationInvariantError::ArtifactCount {
                completed: 1,
                artifacts: 2,
                unexplained: vec!["ghost".into()],
            }
        );
        assert!(err.to_string().contains("unexplained: ghost"));
    }

    #[test]
    fn skipped_live_check_still_classifies() {
        let r = reconcile(&population(), &ids(&["done"]), None).unwrap();
        assert!(!r.live_verified);
        assert_eq!(r.count(Classification::Active), 1);
    }

    #[test]
    fn dumb_mode_resubmits_everything_not_complete() {
        let r = reconcile_dumb(&population());
        assert_eq!(r.mode, ReconcileMode::Dumb);
        assert_eq!(r.resubmit.len(), 4);
        assert!(!r.resubmit.contains(&JobIdentity::new("done")));
        assert!(r.resubmit.contains(&JobIdentity::new("running")));
        assert!(r.likely_running.is_empty());
    }

    #[test]
    fn dumb_mode_leaves_jobs_with_empty_stdout_alone() {
        let mut analyses = population();
        analyses.push(with_stdout("silent", &[Submitted, Executing], false, false, true));
        analyses.push(with_stdout(
            "silent_failure",
            &[Submitted, Executing, Terminated],
            false,
            false,
            true,
        ));

        let r = reconcile_dumb(&analyses);
        assert_eq!(r.likely_running, ids(&["silent", "silent_failure"]));
        assert!(!r.resubmit.contains(&JobIdentity::new("silent")));
        assert!(!r.resubmit.contains(&JobIdentity::new("silent_failure")));
        assert_eq!(r.resubmit.len(), 4);

        let strict = reconcile(&analyses, &ids(&["done"]), None).unwrap();
        assert!(strict.likely_running.is_empty());
        assert!(strict.resubmit.contains(&JobIdentity::new("silent_failure")));
    }
}
