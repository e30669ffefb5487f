//! Group the files of the monitored directories by job identity.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use lifecycle_core::{FileKind, FileLayout, JobFiles, JobIdentity};

/// The file set on disk does not describe a consistent set of jobs.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("I/O error listing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} file {} has no matching log", .path.display())]
    Orphan {
        identity: JobIdentity,
        kind: FileKind,
        path: PathBuf,
    },

    #[error("{identity} has a log but no stdout file")]
    MissingStdout { identity: JobIdentity },
}

/// Jobs found on disk plus every result artifact, matched or not.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub jobs: Vec<JobFiles>,
    pub artifacts: BTreeSet<JobIdentity>,
}

impl Discovery {
    pub fn identities(&self) -> BTreeSet<JobIdentity> {
        self.jobs.iter().map(|job| job.identity.clone()).collect()
    }

    /// Artifacts whose identity has no log.
    pub fn orphan_artifacts(&self) -> BTreeSet<JobIdentity> {
        let known = self.identities();
        self.artifacts.difference(&known).cloned().collect()
    }
}

#[derive(Default)]
struct Slots {
    log: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    artifact: Option<PathBuf>,
}

impl Slots {
    fn slot(&mut self, kind: FileKind) -> &mut Option<PathBuf> {
        match kind {
            FileKind::Log => &mut self.log,
            FileKind::Stdout => &mut self.stdout,
            FileKind::Stderr => &mut self.stderr,
            FileKind::Artifact => &mut self.artifact,
        }
    }
}

/// List `log_dir` and `artifact_dir` and group their files into jobs.
///
/// Every job needs a log and a stdout file; stderr and the artifact are
/// optional. A stdout or stderr file without a log is an error. Artifacts
/// without a log are kept in [`Discovery::artifacts`] so the reconciler can
/// count them.
pub fn discover(
    log_dir: &Path,
    artifact_dir: &Path,
    layout: &FileLayout,
) -> Result<Discovery, DiscoveryError> {
    let mut slots: BTreeMap<JobIdentity, Slots> = BTreeMap::new();

    if log_dir == artifact_dir {
        collect(log_dir, layout, &FileKind::ALL, &mut slots)?;
    } else {
        collect(
            log_dir,
            layout,
            &[FileKind::Log, FileKind::Stdout, FileKind::Stderr],
            &mut slots,
        )?;
        collect(artifact_dir, layout, &[FileKind::Artifact], &mut slots)?;
    }

    let mut discovery = Discovery::default();
    for (identity, slot) in slots {
        if slot.artifact.is_some() {
            discovery.artifacts.insert(identity.clone());
        }
        let Some(log) = slot.log else {
            if let Some(path) = slot.stdout {
                return Err(DiscoveryError::Orphan {
                    identity,
                    kind: FileKind::Stdout,
                    path,
                });
            }
            if let Some(path) = slot.stderr {
                return Err(DiscoveryError::Orphan {
                    identity,
                    kind: FileKind::Stderr,
                    path,
                });
            }
            tracing::warn!("Result artifact for {} has no log", identity);
            continue;
        };
        let Some(stdout) = slot.stdout else {
            return Err(DiscoveryError::MissingStdout { identity });
        };

        let mut job = JobFiles::new(identity, log, stdout);
        if let Some(stderr) = slot.stderr {
            job = job.with_stderr(stderr);
        }
        if let Some(artifact) = slot.artifact {
            job = job.with_artifact(artifact);
        }
        discovery.jobs.push(job);
    }

    tracing::info!(
        "Discovered {} jobs and {} result artifacts",
        discovery.jobs.len(),
        discovery.artifacts.len()
    );
    Ok(discovery)
}

fn collect(
    dir: &Path,
    layout: &FileLayout,
    kinds: &[FileKind],
    slots: &mut BTreeMap<JobIdentity, Slots>,
) -> Result<(), DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((kind, identity)) = layout.classify(name, kinds) else {
            tracing::debug!("Ignoring {}", path.display());
            continue;
        };

        // A pattern maps one name to one identity, and each kind is listed
        // from a single directory, so a slot is filled at most once.
        *slots.entry(identity).or_default().slot(kind) = Some(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn groups_files_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.log", "a.out", "a.err", "a.root", "b.log", "b.out", "notes.txt"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("c.log")).unwrap();

        let discovery = discover(dir.path(), dir.path(), &FileLayout::default()).unwrap();
        assert_eq!(discovery.jobs.len(), 2);
        let a = &discovery.jobs[0];
        assert_eq!(a.identity.as_str(), "a");
        assert!(a.stderr.is_some());
        assert_eq!(a.artifact, Some(dir.path().join("a.root")));
        assert!(discovery.jobs[1].stderr.is_none());
        assert_eq!(discovery.artifacts.len(), 1);
        assert!(discovery.orphan_artifacts().is_empty());
    }

    #[test]
    fn separate_artifact_dir_and_orphan_artifacts() {
        let logs = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        touch(logs.path(), "a.log");
        touch(logs.path(), "a.out");
        // Only artifacts are looked for here.
        touch(results.path(), "a.log");
        touch(results.path(), "a.root");
        touch(results.path(), "ghost.root");

        let discovery = discover(logs.path(), results.path(), &FileLayout::default()).unwrap();
        assert_eq!(discovery.jobs.len(), 1);
        assert_eq!(discovery.artifacts.len(), 2);
        assert_eq!(
            discovery.orphan_artifacts(),
            BTreeSet::from([JobIdentity::new("ghost")])
        );
    }

    #[test]
    fn stdout_without_log_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.out");
        let err = discover(dir.path(), dir.path(), &FileLayout::default()).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Orphan {
                kind: FileKind::Stdout,
                ..
            }
        ));
    }

    #[test]
    fn log_without_stdout_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.log");
        let err = discover(dir.path(), dir.path(), &FileLayout::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingStdout { .. }));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let err = discover(&gone, &gone, &FileLayout::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Io { .. }));
    }
}
