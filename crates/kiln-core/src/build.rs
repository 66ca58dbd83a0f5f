//! Sequential, fail-fast build orchestration.
//!
//! Each artifact's command runs via `/bin/sh -c` from its build directory,
//! one at a time, in recipe order. The first failure stops the sequence:
//! later artifacts are never attempted, because the install step only ever
//! accepts a complete set.
//!
//! ## Environment contract
//!
//! Build commands inherit the caller's environment plus:
//!
//! | Variable | Value |
//! |---|---|
//! | `JOBS` | Logical CPU count |
//! | `SOURCE_DATE_EPOCH` | `0` (reproducible timestamps) |
//! | `KILN_ARTIFACT` | Name of the artifact being built |
//! | `KILN_SOURCE_ROOT` | Absolute source root |

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use kiln_schema::ArtifactSpec;
use thiserror::Error;

use crate::Reporter;

/// Fixed epoch for `SOURCE_DATE_EPOCH`.
const SOURCE_DATE_EPOCH: &str = "0";

/// Lines of log kept on a failed build.
const LOG_TAIL_LINES: usize = 20;

/// A build sequence stopped at a failed artifact.
#[derive(Error, Debug)]
#[error("artifact '{artifact}' failed to build: {reason}")]
pub struct BuildError {
    /// Name of the failed artifact.
    pub artifact: String,
    /// Exit code, if the command ran and exited normally.
    pub code: Option<i32>,
    /// Human-readable cause.
    pub reason: String,
    /// Last lines of the build log.
    pub log_tail: String,
    /// Full build log, when output was captured to a file.
    pub log_path: Option<PathBuf>,
}

/// Outcome of one build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The command exited zero (or there was nothing to run).
    Success,
    /// The command could not run or exited non-zero.
    Failed {
        /// Exit code, when there is one.
        code: Option<i32>,
        /// Human-readable cause.
        reason: String,
    },
}

/// Captured build output.
#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    /// Log file, absent in verbose mode where output streams to the terminal.
    pub path: Option<PathBuf>,
    /// Last lines of the log (populated on failure).
    pub tail: String,
}

/// Record of one artifact's build. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct BuildResult<'a> {
    /// The artifact this result belongs to.
    pub artifact: &'a ArtifactSpec,
    /// Success or failure.
    pub outcome: BuildOutcome,
    /// Captured output.
    pub log: BuildLog,
    /// Wall-clock time of the step.
    pub elapsed: Duration,
}

impl BuildResult<'_> {
    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Success
    }

    fn to_error(&self) -> Option<BuildError> {
        match &self.outcome {
            BuildOutcome::Success => None,
            BuildOutcome::Failed { code, reason } => Some(BuildError {
                artifact: self.artifact.name.clone(),
                code: *code,
                reason: reason.clone(),
                log_tail: self.log.tail.clone(),
                log_path: self.log.path.clone(),
            }),
        }
    }
}

/// Ordered results of a build sequence.
#[derive(Debug, Clone)]
pub struct BuildReport<'a> {
    /// One entry per attempted artifact, in order. Stops at the first failure.
    pub results: Vec<BuildResult<'a>>,
    /// Number of artifacts requested.
    pub requested: usize,
}

impl<'a> BuildReport<'a> {
    /// Every requested artifact was attempted and succeeded.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.requested && self.results.iter().all(BuildResult::is_success)
    }

    /// The failed result that halted the sequence, if any.
    pub fn failure(&self) -> Option<&BuildResult<'a>> {
        self.results.iter().find(|r| !r.is_success())
    }

    /// Convert a halted sequence into its error.
    ///
    /// # Errors
    ///
    /// Returns the [`BuildError`] of the failed artifact.
    pub fn check(&self) -> Result<(), BuildError> {
        match self.failure().and_then(BuildResult::to_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Options shared by every build step of a run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Package name, used in log file names.
    pub package: String,
    /// Where build logs are written.
    pub log_dir: PathBuf,
    /// Stream output to the terminal instead of a log file.
    pub verbose: bool,
}

/// Runs artifact builds in order, stopping at the first failure.
pub struct BuildOrchestrator<'r> {
    source_root: &'r Path,
    options: &'r BuildOptions,
    reporter: &'r dyn Reporter,
}

impl std::fmt::Debug for BuildOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("source_root", &self.source_root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'r> BuildOrchestrator<'r> {
    /// Create an orchestrator for the tree at `source_root`.
    pub fn new(
        source_root: &'r Path,
        options: &'r BuildOptions,
        reporter: &'r dyn Reporter,
    ) -> Self {
        Self {
            source_root,
            options,
            reporter,
        }
    }

    /// Build `artifacts` in order.
    ///
    /// Returns the results produced so far: all of them on success, or up to
    /// and including the first failure. Artifacts after a failure are never
    /// attempted.
    pub fn run<'a>(&self, artifacts: &'a [ArtifactSpec]) -> BuildReport<'a> {
        let total = artifacts.len();
        let mut halted = false;

        let results = artifacts
            .iter()
            .enumerate()
            .map_while(|(index, artifact)| {
                if halted {
                    return None;
                }
                let result = self.build_one(artifact, index, total);
                halted = !result.is_success();
                Some(result)
            })
            .collect();

        BuildReport {
            results,
            requested: total,
        }
    }

    fn build_one<'a>(
        &self,
        artifact: &'a ArtifactSpec,
        index: usize,
        total: usize,
    ) -> BuildResult<'a> {
        let started = Instant::now();
        self.reporter.building(&artifact.name, index, total);

        let (outcome, log) = if artifact.has_command() {
            self.execute(artifact)
        } else {
            tracing::debug!(artifact = %artifact.name, "no build command, nothing to run");
            (BuildOutcome::Success, BuildLog::default())
        };

        let elapsed = started.elapsed();
        match &outcome {
            BuildOutcome::Success => {
                tracing::info!(artifact = %artifact.name, secs = elapsed.as_secs_f64(), "built");
                self.reporter.built(&artifact.name, elapsed.as_secs_f64());
            }
            BuildOutcome::Failed { code, reason } => {
                tracing::warn!(artifact = %artifact.name, ?code, %reason, "build failed");
                self.reporter.failed(&artifact.name, reason);
            }
        }

        BuildResult {
            artifact,
            outcome,
            log,
            elapsed,
        }
    }

    fn execute(&self, artifact: &ArtifactSpec) -> (BuildOutcome, BuildLog) {
        let build_dir = self.source_root.join(&artifact.build_dir);
        if !build_dir.is_dir() {
            return (
                BuildOutcome::Failed {
                    code: None,
                    reason: format!("build directory {} does not exist", build_dir.display()),
                },
                BuildLog::default(),
            );
        }

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&artifact.command)
            .current_dir(&build_dir)
            .env("JOBS", num_cpus::get().to_string())
            .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
            .env("KILN_ARTIFACT", &artifact.name)
            .env("KILN_SOURCE_ROOT", self.source_root);

        tracing::debug!(
            artifact = %artifact.name,
            dir = %build_dir.display(),
            command = %artifact.command,
            "running build command"
        );

        if self.options.verbose {
            let outcome = match cmd.status() {
                Ok(status) if status.success() => BuildOutcome::Success,
                Ok(status) => BuildOutcome::Failed {
                    code: status.code(),
                    reason: describe_exit(status),
                },
                Err(e) => spawn_failure(&e),
            };
            return (outcome, BuildLog::default());
        }

        let log_path = self.options.log_dir.join(crate::paths::log_file_name(
            &self.options.package,
            &format!("build-{}", artifact.name),
        ));
        let status = open_log(&log_path).and_then(|log_file| {
            cmd.stdout(Stdio::from(log_file.try_clone()?))
                .stderr(Stdio::from(log_file))
                .status()
        });

        let outcome = match status {
            Ok(status) if status.success() => BuildOutcome::Success,
            Ok(status) => BuildOutcome::Failed {
                code: status.code(),
                reason: describe_exit(status),
            },
            Err(e) => spawn_failure(&e),
        };

        let tail = if outcome == BuildOutcome::Success {
            String::new()
        } else {
            read_last_lines(&log_path, LOG_TAIL_LINES).unwrap_or_default()
        };

        (
            outcome,
            BuildLog {
                path: Some(log_path),
                tail,
            },
        )
    }
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::File::create(path)
}

fn spawn_failure(err: &std::io::Error) -> BuildOutcome {
    BuildOutcome::Failed {
        code: None,
        reason: format!("failed to execute build command: {err}"),
    }
}

fn describe_exit(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => format!("terminated abnormally ({status})"),
    }
}

/// Read the last N lines from a file efficiently.
///
/// Instead of loading the entire file, we seek to near the end and read a fixed-size
/// tail buffer. Build logs for large C++ projects run to many megabytes.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<String> {
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    // Read at most 16KB from the end (enough for ~400 lines at 40 chars each)
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // If we seeked mid-file, skip the first (partial) line
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&buffer[..], |idx| &buffer[idx + 1..])
    } else {
        &buffer[..]
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use kiln_schema::ArtifactKind;
    use tempfile::tempdir;

    fn artifact(name: &str, command: &str) -> ArtifactSpec {
        ArtifactSpec {
            name: name.to_string(),
            kind: ArtifactKind::Executable,
            build_dir: PathBuf::from("."),
            command: command.to_string(),
            output: PathBuf::from(name),
            install_as: name.to_string(),
            extensions: None,
        }
    }

    fn options(log_dir: &Path) -> BuildOptions {
        BuildOptions {
            package: "demo".to_string(),
            log_dir: log_dir.to_path_buf(),
            verbose: false,
        }
    }

    #[test]
    fn test_all_succeed_in_order() {
        let src = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let opts = options(logs.path());
        let orchestrator = BuildOrchestrator::new(src.path(), &opts, &NullReporter);

        let artifacts = vec![
            artifact("a", "echo a >> order.txt"),
            artifact("b", "echo b >> order.txt"),
            artifact("c", "echo c >> order.txt"),
        ];
        let report = orchestrator.run(&artifacts);

        assert!(report.is_complete());
        assert!(report.check().is_ok());
        assert_eq!(report.results.len(), 3);
        let order = std::fs::read_to_string(src.path().join("order.txt")).unwrap();
        assert_eq!(order, "a\nb\nc\n");
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let src = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let opts = options(logs.path());
        let orchestrator = BuildOrchestrator::new(src.path(), &opts, &NullReporter);

        let artifacts = vec![
            artifact("A", "touch A.built"),
            artifact("B", "echo 'compile error' >&2; exit 3"),
            artifact("C", "touch C.built"),
        ];
        let report = orchestrator.run(&artifacts);

        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].is_success());
        assert_eq!(report.results[0].artifact.name, "A");
        assert_eq!(
            report.results[1].outcome,
            BuildOutcome::Failed {
                code: Some(3),
                reason: "exited with code 3".to_string()
            }
        );
        assert!(!report.is_complete());
        assert!(src.path().join("A.built").exists());
        assert!(!src.path().join("C.built").exists(), "C must never be attempted");

        let err = report.check().unwrap_err();
        assert_eq!(err.artifact, "B");
        assert_eq!(err.code, Some(3));
        assert!(err.log_tail.contains("compile error"));
        assert!(err.log_path.unwrap().exists());
    }

    #[test]
    fn test_missing_build_dir_is_failure() {
        let src = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let opts = options(logs.path());
        let orchestrator = BuildOrchestrator::new(src.path(), &opts, &NullReporter);

        let mut a = artifact("a", "true");
        a.build_dir = PathBuf::from("does/not/exist");
        let artifacts = vec![a, artifact("b", "true")];
        let report = orchestrator.run(&artifacts);

        assert_eq!(report.results.len(), 1);
        let err = report.check().unwrap_err();
        assert!(err.reason.contains("does not exist"));
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_empty_command_succeeds_without_running() {
        let src = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let opts = options(logs.path());
        let orchestrator = BuildOrchestrator::new(src.path(), &opts, &NullReporter);

        let mut headers = artifact("headers", "");
        headers.kind = ArtifactKind::HeaderSet;
        headers.build_dir = PathBuf::from("missing-is-fine-without-command");
        let artifacts = vec![headers];
        let report = orchestrator.run(&artifacts);

        assert!(report.is_complete());
        assert!(report.results[0].log.path.is_none());
    }

    #[test]
    fn test_build_env_contract() {
        let src = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let opts = options(logs.path());
        let orchestrator = BuildOrchestrator::new(src.path(), &opts, &NullReporter);

        let artifacts = vec![artifact(
            "env",
            "test \"$SOURCE_DATE_EPOCH\" = 0 && test -n \"$JOBS\" && test \"$KILN_ARTIFACT\" = env && test -d \"$KILN_SOURCE_ROOT\"",
        )];
        assert!(orchestrator.run(&artifacts).is_complete());
    }

    #[test]
    fn test_read_last_lines() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        let body: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).unwrap();

        let tail = read_last_lines(&path, 3).unwrap();
        assert_eq!(tail, "line 48\nline 49\nline 50");
    }
}
