//! Resubmission manifest: the original submission script cut down to the
//! blocks of the jobs that need another run.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use lifecycle_core::{FilePattern, JobIdentity, SubmitConfig};

/// The submission script cannot be split into blocks.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("block opened at line {start_line} is never closed")]
    Unterminated { start_line: usize },

    #[error("block opened at line {line} while the block from line {open_line} is still open")]
    Nested { line: usize, open_line: usize },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something the builder could not match up. Needs a human, stops nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestMismatch {
    #[error("{identity} needs resubmission but has no block in the submission script")]
    MissingBlock { identity: JobIdentity },

    #[error("block at line {line} names no job")]
    Unattributed { line: usize },

    #[error("second block for {identity} at line {line} ignored")]
    Duplicate { identity: JobIdentity, line: usize },
}

/// Result of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOutcome {
    pub text: String,
    /// Identities whose blocks were copied, in script order.
    pub copied: Vec<JobIdentity>,
    pub mismatches: Vec<ManifestMismatch>,
}

/// The text after `key` when the trimmed line starts with it, matched
/// case-insensitively and followed by whitespace, `=` or the end of the line.
fn directive_rest<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let line = line.trim_start();
    let head = line.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = &line[key.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == '=' || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

struct OpenBlock {
    start_line: usize,
    lines: Vec<String>,
    identity: Option<JobIdentity>,
}

/// Splits a submission script into header and per-job blocks.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    start_token: String,
    end_token: String,
    identity_key: String,
    log_pattern: FilePattern,
}

impl ManifestBuilder {
    pub fn new(config: &SubmitConfig, log_pattern: FilePattern) -> Self {
        Self {
            start_token: config.start_token.clone(),
            end_token: config.end_token.clone(),
            identity_key: config.identity_key.clone(),
            log_pattern,
        }
    }

    fn is_start(&self, line: &str) -> bool {
        directive_rest(line, &self.start_token).is_some()
    }

    fn is_end(&self, line: &str) -> bool {
        line.trim() == self.end_token
    }

    fn identity_in(&self, line: &str) -> Option<JobIdentity> {
        let value = directive_rest(line, &self.identity_key)?.trim_start();
        let value = value.strip_prefix('=')?;
        self.log_pattern.identity_of_path(Path::new(value.trim()))
    }

    /// Stream the script once, keeping the header and the blocks of
    /// `resubmit` members in their original order.
    ///
    /// Lines between two blocks travel with the block that follows them.
    /// Lines after the last block are dropped.
    pub fn build<R: BufRead>(
        &self,
        reader: R,
        source: &Path,
        resubmit: &BTreeSet<JobIdentity>,
    ) -> Result<ManifestOutcome, ManifestError> {
        let mut outcome = ManifestOutcome::default();
        let mut seen_block = false;
        let mut pending: Vec<String> = Vec::new();
        let mut open: Option<OpenBlock> = None;
        let mut attributed: BTreeSet<JobIdentity> = BTreeSet::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source_err| ManifestError::Io {
                path: source.to_path_buf(),
                source: source_err,
            })?;
            let line_no = index + 1;

            let Some(block) = open.as_mut() else {
                if self.is_start(&line) {
                    seen_block = true;
                    open = Some(OpenBlock {
                        start_line: line_no,
                        identity: self.identity_in(&line),
                        lines: vec![line],
                    });
                } else if seen_block {
                    pending.push(line);
                } else {
                    outcome.text.push_str(&line);
                    outcome.text.push('\n');
                }
                continue;
            };

            if self.is_start(&line) {
                return Err(ManifestError::Nested {
                    line: line_no,
                    open_line: block.start_line,
                });
            }
            if block.identity.is_none() {
                block.identity = self.identity_in(&line);
            }
            let closes = self.is_end(&line);
            block.lines.push(line);
            if !closes {
                continue;
            }

            let Some(block) = open.take() else { continue };
            let preamble = std::mem::take(&mut pending);
            let Some(identity) = block.identity else {
                outcome.mismatches.push(ManifestMismatch::Unattributed {
                    line: block.start_line,
                });
                continue;
            };
            if !attributed.insert(identity.clone()) {
                outcome.mismatches.push(ManifestMismatch::Duplicate {
                    identity,
                    line: block.start_line,
                });
                continue;
            }
            if resubmit.contains(&identity) {
                for line in preamble.iter().chain(&block.lines) {
                    outcome.text.push_str(line);
                    outcome.text.push('\n');
                }
                outcome.copied.push(identity);
            }
        }

        if let Some(block) = open {
            return Err(ManifestError::Unterminated {
                start_line: block.start_line,
            });
        }

        outcome.mismatches.extend(
            resubmit
                .iter()
                .filter(|id| !attributed.contains(*id))
                .map(|id| ManifestMismatch::MissingBlock {
                    identity: id.clone(),
                }),
        );

        tracing::info!(
            "Manifest keeps {} of {} blocks from {}",
            outcome.copied.len(),
            attributed.len(),
            source.display()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "\
universe = vanilla
executable = run_looper.sh
+MaxRuntime = 7200

arguments = -i mc16a.ttbar.txt -o ttbar
log = /batch/logs/ttbar.log
output = /batch/logs/ttbar.out
queue

# signal
arguments = -i mc16a.stop.txt -o stop
log = /batch/logs/stop.log
output = /batch/logs/stop.out
queue

arguments = -i mc16a.wjets.txt
log = /batch/logs/wjets.log
queue
";

    fn builder() -> ManifestBuilder {
        ManifestBuilder::new(&SubmitConfig::default(), FilePattern::new("", ".log"))
    }

    fn ids(names: &[&str]) -> BTreeSet<JobIdentity> {
        names.iter().copied().map(JobIdentity::new).collect()
    }

    fn build(script: &str, resubmit: &BTreeSet<JobIdentity>) -> Result<ManifestOutcome, ManifestError> {
        builder().build(script.as_bytes(), Path::new("submit.sub"), resubmit)
    }

    #[test]
    fn keeps_header_and_selected_blocks_in_order() {
        let outcome = build(SCRIPT, &ids(&["wjets", "stop"])).unwrap();
        assert_eq!(
            outcome.text,
            "universe = vanilla\nexecutable = run_looper.sh\n+MaxRuntime = 7200\n\n\
             \n# signal\narguments = -i mc16a.stop.txt -o stop\n\
             log = /batch/logs/stop.log\noutput = /batch/logs/stop.out\nqueue\n\
             \narguments = -i mc16a.wjets.txt\nlog = /batch/logs/wjets.log\nqueue\n"
        );
        assert_eq!(outcome.copied, vec![JobIdentity::new("stop"), JobIdentity::new("wjets")]);
        assert!(outcome.mismatches.is_empty());
    }

    #[test]
    fn rebuilding_own_output_with_nothing_selected_leaves_header() {
        let first = build(SCRIPT, &ids(&["ttbar", "wjets"])).unwrap();
        let second = build(&first.text, &BTreeSet::new()).unwrap();
        assert_eq!(
            second.text,
            "universe = vanilla\nexecutable = run_looper.sh\n+MaxRuntime = 7200\n\n"
        );
        assert!(second.copied.is_empty());
    }

    #[test]
    fn reports_missing_unattributed_and_duplicate_blocks() {
        let script = "\
executable = a.sh
arguments = one
log = /x/one.log
queue
arguments = anonymous
queue
Arguments = one again
log = /x/one.log
queue
";
        let outcome = build(script, &ids(&["one", "ghost"])).unwrap();
        assert_eq!(outcome.copied, vec![JobIdentity::new("one")]);
        assert!(outcome.text.contains("arguments = one\n"));
        assert!(!outcome.text.contains("one again"));
        assert_eq!(
            outcome.mismatches,
            vec![
                ManifestMismatch::Unattributed { line: 5 },
                ManifestMismatch::Duplicate {
                    identity: JobIdentity::new("one"),
                    line: 7,
                },
                ManifestMismatch::MissingBlock {
                    identity: JobIdentity::new("ghost"),
                },
            ]
        );
    }

    #[test]
    fn format_errors_are_fatal() {
        let nested = "arguments = a\nlog = a.log\narguments = b\nqueue\n";
        assert!(matches!(
            build(nested, &BTreeSet::new()),
            Err(ManifestError::Nested { line: 3, open_line: 1 })
        ));

        let open = "header\narguments = a\nlog = a.log\n";
        assert!(matches!(
            build(open, &BTreeSet::new()),
            Err(ManifestError::Unterminated { start_line: 2 })
        ));
    }

    #[test]
    fn directives_without_spaces_open_and_name_blocks() {
        let script = "\
universe = vanilla
arguments=-i a.txt
log=/x/a.log
queue
ARGUMENTS =-i b.txt
log =/x/b.log
queue
";
        let outcome = build(script, &ids(&["b"])).unwrap();
        assert_eq!(
            outcome.text,
            "universe = vanilla\nARGUMENTS =-i b.txt\nlog =/x/b.log\nqueue\n"
        );
        assert_eq!(outcome.copied, vec![JobIdentity::new("b")]);
        assert!(outcome.mismatches.is_empty());

        let none = build(script, &BTreeSet::new()).unwrap();
        assert_eq!(none.text, "universe = vanilla\n");
    }

    #[test]
    fn similar_keys_are_not_directives() {
        let b = builder();
        assert!(b.is_start("arguments"));
        assert!(b.is_start("  arguments\t= x"));
        assert!(!b.is_start("arguments_extra = x"));
        assert!(!b.is_start("# arguments = x"));
        assert_eq!(b.identity_in("LOG=/x/a.log"), Some(JobIdentity::new("a")));
        assert_eq!(b.identity_in("logfile = /x/a.log"), None);
        assert_eq!(b.identity_in("log /x/a.log"), None);
    }

    #[test]
    fn identity_key_in_header_stays_in_header() {
        let script = "\
executable = a.sh
log = /batch/logs/cluster.log
arguments = one
log = /batch/logs/one.log
queue
arguments = two
log = /batch/logs/two.log
queue
";
        let outcome = build(script, &ids(&["two"])).unwrap();
        assert_eq!(
            outcome.text,
            "executable = a.sh\nlog = /batch/logs/cluster.log\n\
             arguments = two\nlog = /batch/logs/two.log\nqueue\n"
        );
        assert_eq!(outcome.copied, vec![JobIdentity::new("two")]);
        assert!(outcome.mismatches.is_empty());
    }

    #[test]
    fn end_token_must_be_the_whole_line() {
        let script = "arguments = a\nlog = a.log\nqueue 5\n  queue  \n";
        let outcome = build(script, &ids(&["a"])).unwrap();
        assert_eq!(outcome.text, "arguments = a\nlog = a.log\nqueue 5\n  queue  \n");
    }
}
