//! Smoke testing of one installed executable.
//!
//! The run is strictly ordered:
//!
//! 1. Version check: run the binary with the help arguments (bounded) and
//!    look for the expected marker in its output.
//! 2. Allocate an ephemeral port by binding port 0 on loopback and releasing
//!    it immediately.
//! 3. Launch the binary with the port, inside a [`TestSession`].
//! 4. Wait the fixed settle interval, then check the child is still up (and
//!    optionally that something accepts connections on the port).
//! 5. Terminate: SIGTERM, bounded wait, SIGKILL on timeout, reap.
//!
//! Step 5 runs on every path once step 3 has succeeded. [`TestSession`] owns
//! the child handle and kills and reaps it on drop if nothing else did.

use std::fs::File;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use kiln_schema::SmokeSpec;
use thiserror::Error;
use wait_timeout::ChildExt;

use crate::Reporter;

/// Connect timeout for the optional readiness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Smoke test failures.
#[derive(Error, Debug)]
pub enum SmokeError {
    /// No ephemeral port could be obtained.
    #[error("failed to allocate a port: {0}")]
    Port(io::Error),

    /// The binary could not be started.
    #[error("failed to launch {}: {source}", .binary.display())]
    Launch {
        /// Binary path.
        binary: PathBuf,
        /// Underlying spawn error.
        source: io::Error,
    },

    /// The binary ran but did not behave as expected.
    #[error("assertion failed: {message}{}", cleanup_suffix(.cleanup.as_deref()))]
    Assertion {
        /// What was expected.
        message: String,
        /// Output observed from the process under test.
        output: String,
        /// Cleanup failure that followed, reported without masking this one.
        cleanup: Option<Box<SmokeError>>,
    },

    /// The child could not be signalled, or needed SIGKILL.
    #[error("failed to terminate pid {pid}: {reason}")]
    Termination {
        /// Child process id.
        pid: u32,
        /// What went wrong.
        reason: String,
    },
}

fn cleanup_suffix(cleanup: Option<&SmokeError>) -> String {
    cleanup.map_or_else(String::new, |e| format!(" (cleanup also failed: {e})"))
}

/// How a session's child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The child had already exited when termination began.
    AlreadyExited(ExitStatus),
    /// The child exited within the grace period after SIGTERM.
    Graceful(ExitStatus),
    /// The child ignored SIGTERM and was killed.
    Forced(ExitStatus),
}

impl Termination {
    /// Exit status of the reaped child.
    pub fn status(self) -> ExitStatus {
        match self {
            Self::AlreadyExited(s) | Self::Graceful(s) | Self::Forced(s) => s,
        }
    }
}

/// Ask the OS for a currently unused TCP port on loopback.
///
/// The listener is dropped before returning, so the port is free for the
/// child to bind.
///
/// # Errors
///
/// Returns an error if binding fails or the OS reports port 0.
pub fn allocate_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    if port == 0 {
        return Err(io::Error::other("operating system assigned port 0"));
    }
    Ok(port)
}

/// Whether something accepts TCP connections on `127.0.0.1:port`.
pub fn probe_port(port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

/// One launched child and the port it owns.
///
/// The child handle is released exactly once: by [`TestSession::terminate`],
/// or by `Drop` as a last resort.
#[derive(Debug)]
pub struct TestSession {
    port: u16,
    pid: u32,
    child: Option<Child>,
    log_path: PathBuf,
    observed_output: String,
    termination: Option<Termination>,
}

impl TestSession {
    /// Spawn `binary` with `args`, sending its output to `log_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::Launch`] if the log cannot be created or the
    /// process cannot be started.
    pub fn launch(
        binary: &Path,
        args: &[String],
        port: u16,
        log_path: &Path,
    ) -> Result<Self, SmokeError> {
        let launch_err = |source| SmokeError::Launch {
            binary: binary.to_path_buf(),
            source,
        };

        let log = open_log(log_path).map_err(launch_err)?;
        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone().map_err(launch_err)?))
            .stderr(Stdio::from(log));
        let child = spawn_installed(&mut command).map_err(launch_err)?;

        let pid = child.id();
        tracing::info!(binary = %binary.display(), pid, port, "launched");

        Ok(Self {
            port,
            pid,
            child: Some(child),
            log_path: log_path.to_path_buf(),
            observed_output: String::new(),
            termination: None,
        })
    }

    /// The port this session owns.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Child process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Child output, available once the child has been reaped.
    pub fn observed_output(&self) -> &str {
        &self.observed_output
    }

    /// How the child ended, once it has.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Non-blocking check whether the child has exited. An exited child is
    /// reaped on the spot.
    ///
    /// # Errors
    ///
    /// Returns an error if the child's status cannot be polled.
    pub fn poll_exited(&mut self) -> io::Result<Option<ExitStatus>> {
        if let Some(done) = self.termination {
            return Ok(Some(done.status()));
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => {
                self.child = None;
                self.termination = Some(Termination::AlreadyExited(status));
                self.collect_output();
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Stop the child: SIGTERM, wait up to `grace`, then SIGKILL; always reap.
    ///
    /// Idempotent: once the child is reaped, further calls return the
    /// recorded outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::Termination`] if the child could not be
    /// signalled or polled. The child is still killed and reaped in that
    /// case; if even that reap fails, the session keeps the child.
    pub fn terminate(&mut self, grace: Duration) -> Result<Termination, SmokeError> {
        if let Some(done) = self.termination {
            return Ok(done);
        }
        let Some(mut child) = self.child.take() else {
            return Err(SmokeError::Termination {
                pid: self.pid,
                reason: "no child process to terminate".to_string(),
            });
        };

        let result = stop_child(&mut child, grace);
        if result.is_err() {
            let _ = child.kill();
            let reaped = child.wait();
            self.record_fallback_reap(child, reaped);
        }
        self.collect_output();

        match result {
            Ok(done) => {
                tracing::info!(pid = self.pid, ?done, "child reaped");
                self.termination = Some(done);
                Ok(done)
            }
            Err(reason) => Err(SmokeError::Termination {
                pid: self.pid,
                reason,
            }),
        }
    }

    /// Record the last-resort reap after a failed stop. A child that still
    /// could not be reaped stays owned, so a later `terminate` or `Drop`
    /// tries again.
    fn record_fallback_reap(&mut self, child: Child, reaped: io::Result<ExitStatus>) {
        match reaped {
            Ok(status) => self.termination = Some(Termination::Forced(status)),
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "failed to reap child");
                self.child = Some(child);
            }
        }
    }

    fn collect_output(&mut self) {
        self.observed_output = std::fs::read(&self.log_path)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::warn!(pid = self.pid, "smoke session dropped with a live child, killing");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn stop_child(child: &mut Child, grace: Duration) -> Result<Termination, String> {
    if let Some(status) = child
        .try_wait()
        .map_err(|e| format!("failed to poll child: {e}"))?
    {
        return Ok(Termination::AlreadyExited(status));
    }

    send_terminate(child).map_err(|e| format!("failed to send SIGTERM: {e}"))?;

    match child
        .wait_timeout(grace)
        .map_err(|e| format!("failed to wait for child: {e}"))?
    {
        Some(status) => Ok(Termination::Graceful(status)),
        None => {
            tracing::warn!(pid = child.id(), ?grace, "child ignored SIGTERM, sending SIGKILL");
            child
                .kill()
                .map_err(|e| format!("failed to send SIGKILL: {e}"))?;
            let status = child
                .wait()
                .map_err(|e| format!("failed to reap killed child: {e}"))?;
            Ok(Termination::Forced(status))
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_terminate(child: &Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(io::Error::other)?;
    // SAFETY: kill(2) only takes integers. The pid belongs to a child we
    // spawned and have not yet reaped, so it cannot have been recycled.
    let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// Spawn, retrying briefly on ETXTBSY: a freshly installed binary can still
/// be open for writing in another process that forked during the copy.
fn spawn_installed(command: &mut Command) -> io::Result<Child> {
    const ATTEMPTS: u32 = 5;
    let mut attempt = 1;
    loop {
        match command.spawn() {
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < ATTEMPTS => {
                tracing::debug!(attempt, "executable busy, retrying spawn");
                std::thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Per-run smoke test settings.
#[derive(Debug, Clone)]
pub struct SmokeOptions {
    /// Package name, used in log file names.
    pub package: String,
    /// Package version, substituted into the expected marker.
    pub version: String,
    /// Where smoke logs are written.
    pub log_dir: PathBuf,
}

/// What a passing smoke test observed.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    /// Output of the version check.
    pub version_output: String,
    /// Port handed to the child.
    pub port: u16,
    /// Child process id.
    pub pid: u32,
    /// How the child ended.
    pub termination: Termination,
    /// Child output during the launch phase.
    pub observed_output: String,
}

/// Verifies one installed executable end-to-end.
pub struct SmokeTestRunner<'r> {
    options: &'r SmokeOptions,
    reporter: &'r dyn Reporter,
}

impl std::fmt::Debug for SmokeTestRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmokeTestRunner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'r> SmokeTestRunner<'r> {
    /// Create a runner.
    pub fn new(options: &'r SmokeOptions, reporter: &'r dyn Reporter) -> Self {
        Self { options, reporter }
    }

    /// Run the full smoke sequence against `binary`.
    ///
    /// # Errors
    ///
    /// - [`SmokeError::Launch`] if the binary is missing or cannot start.
    /// - [`SmokeError::Assertion`] if the version marker is missing, the
    ///   child exits before the settle interval ends, or the readiness probe
    ///   fails. Any cleanup failure is attached, not substituted.
    /// - [`SmokeError::Port`] if no port can be allocated.
    /// - [`SmokeError::Termination`] if the child needed SIGKILL or could not
    ///   be signalled.
    pub fn run(&self, binary: &Path, spec: &SmokeSpec) -> Result<SmokeReport, SmokeError> {
        if !binary.is_file() {
            return Err(SmokeError::Launch {
                binary: binary.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "binary is not installed"),
            });
        }

        let version_output = self.check_version(binary, spec)?;

        let port = allocate_port().map_err(SmokeError::Port)?;
        let args = spec.launch_args_for(port);
        let log_path = self
            .options
            .log_dir
            .join(crate::paths::log_file_name(&self.options.package, "smoke"));

        let mut session = TestSession::launch(binary, &args, port, &log_path)?;
        self.reporter
            .info(&format!("launched {} on port {port}", binary.display()));

        std::thread::sleep(spec.settle());
        let check = Self::check_running(&mut session, spec);
        let termination = session.terminate(spec.terminate_timeout());

        match (check, termination) {
            (Err(message), term) => {
                let cleanup = match term {
                    Ok(Termination::Forced(_)) => Some(Box::new(forced(&session, spec))),
                    Ok(_) => None,
                    Err(e) => Some(Box::new(e)),
                };
                Err(SmokeError::Assertion {
                    message,
                    output: session.observed_output().to_string(),
                    cleanup,
                })
            }
            (Ok(()), Ok(Termination::Forced(_))) => Err(forced(&session, spec)),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(termination)) => Ok(SmokeReport {
                version_output,
                port,
                pid: session.pid(),
                termination,
                observed_output: session.observed_output().to_string(),
            }),
        }
    }

    /// Run the help invocation to completion (bounded) and look for the marker.
    fn check_version(&self, binary: &Path, spec: &SmokeSpec) -> Result<String, SmokeError> {
        let expected = spec.expected_marker(&self.options.version);
        let log_path = self
            .options
            .log_dir
            .join(crate::paths::log_file_name(&self.options.package, "smoke-help"));

        let mut session = TestSession::launch(binary, &spec.help_args, 0, &log_path)?;
        let pid = session.pid();
        let timeout = spec.terminate_timeout();
        let finished = session
            .child
            .as_mut()
            .map(|c| c.wait_timeout(timeout))
            .transpose()
            .map_err(|e| SmokeError::Termination {
                pid,
                reason: format!("failed to wait for version check: {e}"),
            })?
            .flatten();

        if finished.is_none() {
            let _ = session.terminate(timeout);
            return Err(SmokeError::Assertion {
                message: format!(
                    "'{} {}' did not finish within {timeout:?}",
                    binary.display(),
                    spec.help_args.join(" ")
                ),
                output: session.observed_output().to_string(),
                cleanup: None,
            });
        }

        // Exited: reap and collect output.
        session.terminate(timeout)?;
        let output = session.observed_output().to_string();

        if output.contains(&expected) {
            tracing::info!(%expected, "version marker found");
            Ok(output)
        } else {
            Err(SmokeError::Assertion {
                message: format!(
                    "'{} {}' output does not contain '{expected}'",
                    binary.display(),
                    spec.help_args.join(" ")
                ),
                output,
                cleanup: None,
            })
        }
    }

    fn check_running(session: &mut TestSession, spec: &SmokeSpec) -> Result<(), String> {
        match session.poll_exited() {
            Ok(Some(status)) => {
                return Err(format!(
                    "process exited before the {:?} settle interval elapsed ({status})",
                    spec.settle()
                ));
            }
            Ok(None) => {}
            Err(e) => return Err(format!("failed to poll process: {e}")),
        }

        if spec.probe_port && !probe_port(session.port(), PROBE_TIMEOUT) {
            return Err(format!(
                "nothing is listening on port {} after {:?}",
                session.port(),
                spec.settle()
            ));
        }
        Ok(())
    }
}

fn forced(session: &TestSession, spec: &SmokeSpec) -> SmokeError {
    SmokeError::Termination {
        pid: session.pid(),
        reason: format!(
            "did not exit within {:?} of SIGTERM and was killed",
            spec.terminate_timeout()
        ),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::NullReporter;
    use tempfile::{TempDir, tempdir};

    const GOOD: &str = r#"#!/bin/sh
if [ "$1" = "--help" ]; then echo "Tracy Profiler v0.10 usage: tracy [-p port]"; exit 0; fi
echo "listening on $2"
exec sleep 30
"#;

    const STUBBORN: &str = r#"#!/bin/sh
if [ "$1" = "--help" ]; then echo "Tracy Profiler v0.10"; exit 0; fi
trap '' TERM
while :; do sleep 1; done
"#;

    const EARLY_EXIT: &str = r#"#!/bin/sh
if [ "$1" = "--help" ]; then echo "Tracy Profiler v0.10"; exit 0; fi
echo "cannot open display" >&2
exit 1
"#;

    const OLD_VERSION: &str = r#"#!/bin/sh
echo "Tracy Profiler v0.9"
"#;

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn spec() -> SmokeSpec {
        SmokeSpec {
            binary: "tracy".to_string(),
            help_args: vec!["--help".to_string()],
            expect: "Tracy Profiler v{version}".to_string(),
            launch_args: vec!["-p".to_string(), "{port}".to_string()],
            settle_ms: 200,
            terminate_timeout_ms: 2000,
            probe_port: false,
        }
    }

    fn options(dir: &TempDir) -> SmokeOptions {
        SmokeOptions {
            package: "tracy".to_string(),
            version: "0.10".to_string(),
            log_dir: dir.path().join("logs"),
        }
    }

    #[cfg(target_os = "linux")]
    fn assert_reaped(pid: u32) {
        assert!(
            !Path::new(&format!("/proc/{pid}")).exists(),
            "pid {pid} should be gone"
        );
    }

    #[cfg(not(target_os = "linux"))]
    fn assert_reaped(_pid: u32) {}

    #[test]
    fn test_allocated_port_is_nonzero_and_free() {
        let port = allocate_port().unwrap();
        assert_ne!(port, 0);
        // Released on return, so it can be bound again.
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_probe_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(probe_port(port, PROBE_TIMEOUT));
        drop(listener);
        assert!(!probe_port(port, Duration::from_millis(200)));
    }

    #[test]
    fn test_smoke_passes_and_reaps() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", GOOD);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);

        let report = runner.run(&bin, &spec()).unwrap();
        assert!(report.version_output.contains("Tracy Profiler v0.10"));
        assert_ne!(report.port, 0);
        assert!(matches!(report.termination, Termination::Graceful(_)));
        assert!(
            report
                .observed_output
                .contains(&format!("listening on {}", report.port))
        );
        assert_reaped(report.pid);
    }

    #[test]
    fn test_version_mismatch_is_assertion() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", OLD_VERSION);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);

        let err = runner.run(&bin, &spec()).unwrap_err();
        match err {
            SmokeError::Assertion {
                message,
                output,
                cleanup,
            } => {
                assert!(message.contains("Tracy Profiler v0.10"));
                assert!(output.contains("v0.9"));
                assert!(cleanup.is_none());
            }
            other => panic!("expected assertion, got {other:?}"),
        }
    }

    #[test]
    fn test_stubborn_child_is_killed() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", STUBBORN);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);
        let mut spec = spec();
        spec.terminate_timeout_ms = 300;

        let err = runner.run(&bin, &spec).unwrap_err();
        match err {
            SmokeError::Termination { pid, reason } => {
                assert!(reason.contains("killed"));
                assert_reaped(pid);
            }
            other => panic!("expected termination error, got {other:?}"),
        }
    }

    #[test]
    fn test_early_exit_is_assertion() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", EARLY_EXIT);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);

        let err = runner.run(&bin, &spec()).unwrap_err();
        match err {
            SmokeError::Assertion {
                message, output, ..
            } => {
                assert!(message.contains("exited before"));
                assert!(output.contains("cannot open display"));
            }
            other => panic!("expected assertion, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_probe_still_reaps_child() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", GOOD);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);
        let mut spec = spec();
        spec.probe_port = true;

        let err = runner.run(&bin, &spec).unwrap_err();
        match err {
            SmokeError::Assertion {
                message, cleanup, ..
            } => {
                assert!(message.contains("nothing is listening"));
                assert!(cleanup.is_none());
            }
            other => panic!("expected assertion, got {other:?}"),
        }
    }

    #[test]
    fn test_cleanup_failure_does_not_mask_assertion() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", STUBBORN);
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);
        let mut spec = spec();
        spec.probe_port = true;
        spec.terminate_timeout_ms = 300;

        let err = runner.run(&bin, &spec).unwrap_err();
        assert!(err.to_string().contains("cleanup also failed"));
        match err {
            SmokeError::Assertion {
                message,
                cleanup: Some(cleanup),
                ..
            } => {
                assert!(message.contains("nothing is listening"));
                match *cleanup {
                    SmokeError::Termination { pid, reason } => {
                        assert!(reason.contains("killed"));
                        assert_reaped(pid);
                    }
                    other => panic!("expected termination cleanup, got {other:?}"),
                }
            }
            other => panic!("expected assertion with cleanup, got {other:?}"),
        }
    }

    #[test]
    fn test_unreaped_child_stays_owned() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", GOOD);
        let mut session = TestSession::launch(
            &bin,
            &["-p".to_string(), "1".to_string()],
            1,
            &dir.path().join("s.log"),
        )
        .unwrap();

        let child = session.child.take().unwrap();
        session.record_fallback_reap(child, Err(io::Error::other("wait failed")));
        assert!(session.child.is_some());
        assert!(session.termination().is_none());

        // A later terminate still stops and reaps it.
        let done = session.terminate(Duration::from_secs(2)).unwrap();
        assert!(matches!(done, Termination::Graceful(_)));
        assert_reaped(session.pid());
    }

    #[test]
    fn test_missing_binary_is_launch_error() {
        let dir = tempdir().unwrap();
        let opts = options(&dir);
        let runner = SmokeTestRunner::new(&opts, &NullReporter);
        let err = runner
            .run(&dir.path().join("bin/tracy"), &spec())
            .unwrap_err();
        assert!(matches!(err, SmokeError::Launch { .. }));
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", GOOD);
        let port = allocate_port().unwrap();
        let mut session = TestSession::launch(
            &bin,
            &["-p".to_string(), port.to_string()],
            port,
            &dir.path().join("session.log"),
        )
        .unwrap();

        let first = session.terminate(Duration::from_secs(2)).unwrap();
        let second = session.terminate(Duration::from_secs(2)).unwrap();
        assert_eq!(first, second);
        assert_reaped(session.pid());
    }

    #[test]
    fn test_drop_reaps_live_child() {
        let dir = tempdir().unwrap();
        let bin = script(&dir, "tracy", GOOD);
        let session =
            TestSession::launch(&bin, &["-p".to_string(), "1".to_string()], 1, &dir.path().join("s.log"))
                .unwrap();
        let pid = session.pid();
        drop(session);
        assert_reaped(pid);
    }
}
