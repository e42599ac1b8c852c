//! Subprocess execution with concurrent stream capture.
//!
//! [`ProcessHarness::run`] blocks until the child exits or its timeout fires.
//! Internally one reader thread per output stream drains the pipes while the
//! calling thread polls the child against the deadline, so a child that fills
//! either pipe never stalls. A failed child is data, not an error: launch
//! failures, timeouts and non-zero exits all come back as an
//! [`ExecutionOutcome`]. Only a broken environment (missing working
//! directory, failure to poll the child) is reported as a [`HarnessError`].

mod capture;
pub mod memory;
mod outcome;

pub use outcome::{ExecutionOutcome, ExecutionStatus};

use crate::domain::ProbeError;
use capture::StreamCapture;
use memory::MemorySample;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Exit code reported when the program could not be found.
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;
/// Exit code reported when the program exists but may not be executed.
pub const PERMISSION_DENIED_EXIT_CODE: i32 = 126;
/// Exit code reported for any other launch failure.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 1;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(250);

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Clone)]
pub struct ProcessHarness {
    poll_interval: Duration,
    drain_grace: Duration,
}

impl Default for ProcessHarness {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

impl ProcessHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long readers may keep draining after the child has gone away.
    pub fn with_drain_grace(mut self, drain_grace: Duration) -> Self {
        self.drain_grace = drain_grace;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn run<P, S>(
        &self,
        program: P,
        args: &[S],
        working_dir: &Path,
        timeout: Duration,
    ) -> HarnessResult<ExecutionOutcome>
    where
        P: AsRef<OsStr>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        check_working_dir(working_dir)?;
        let command_line = render_command_line(program, args);

        let memory = MemorySample::start();
        let started = Instant::now();
        tracing::debug!(command = %command_line, cwd = %working_dir.display(), ?timeout, "spawning program");

        let spawned = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                tracing::warn!(command = %command_line, error = %source, "program failed to launch");
                return Ok(ExecutionOutcome::new(
                    command_line.clone(),
                    ExecutionStatus::LaunchFailed {
                        code: launch_failure_exit_code(&source),
                    },
                    String::new(),
                    format!("failed to launch '{}': {}", command_line, source),
                    elapsed_ms(started),
                    memory.delta_bytes(),
                    true,
                ));
            }
        };

        let stdout = StreamCapture::spawn("stdout", child.stdout.take());
        let stderr = StreamCapture::spawn("stderr", child.stderr.take());
        let (stdout, stderr) = match (stdout, stderr) {
            (Ok(stdout), Ok(stderr)) => (stdout, stderr),
            (Err(source), _) | (_, Err(source)) => {
                terminate(&mut child);
                return Err(HarnessError::ReaderThread { source });
            }
        };

        // A timeout too large to represent means no deadline at all.
        let deadline = started.checked_add(timeout);
        let waited = self.wait_until(&mut child, deadline, &command_line);
        let exit_status = match waited {
            Ok(status) => status,
            Err(source) => {
                terminate(&mut child);
                return Err(HarnessError::Wait {
                    command: command_line,
                    source,
                });
            }
        };

        // Descendants may still hold the pipes open; never wait past the
        // caller's timeout plus the grace period.
        let now = Instant::now();
        let drain_from = match (exit_status, deadline) {
            (Some(_), Some(deadline)) => now.max(deadline),
            _ => now,
        };
        let drain_deadline = drain_from.checked_add(self.drain_grace);
        let stdout = stdout.finish(drain_deadline);
        let stderr = stderr.finish(drain_deadline);

        let status = match exit_status {
            Some(status) => ExecutionStatus::Exited {
                code: exit_code_from_status(status),
            },
            None => ExecutionStatus::TimedOut,
        };

        let outcome = ExecutionOutcome::new(
            command_line,
            status,
            stdout.text,
            stderr.text,
            elapsed_ms(started),
            memory.delta_bytes(),
            stdout.complete && stderr.complete,
        );
        tracing::debug!(summary = %outcome.summary_line(), "program finished");
        Ok(outcome)
    }

    /// Polls the child until it exits (`Some`) or the deadline passes, in
    /// which case it is killed and reaped (`None`). Without a deadline the
    /// child is polled until it exits.
    fn wait_until(
        &self,
        child: &mut Child,
        deadline: Option<Instant>,
        command_line: &str,
    ) -> io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(command = %command_line, "program exceeded its timeout; killing it");
                        terminate(child);
                        return Ok(None);
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            thread::sleep(pause);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("working directory '{}' is not accessible: {source}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("working directory '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("failed to start stream reader thread: {source}")]
    ReaderThread { source: std::io::Error },
    #[error("failed to wait for '{command}': {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
}

impl From<HarnessError> for ProbeError {
    fn from(error: HarnessError) -> Self {
        let message = error.to_string();
        match error {
            HarnessError::WorkingDirectory { .. } | HarnessError::NotADirectory { .. } => {
                ProbeError::io_system("IO.HARNESS_WORKING_DIR", message)
            }
            HarnessError::ReaderThread { .. } | HarnessError::Wait { .. } => {
                ProbeError::internal("SYS.HARNESS", message)
            }
        }
    }
}

fn check_working_dir(working_dir: &Path) -> HarnessResult<()> {
    let metadata =
        std::fs::metadata(working_dir).map_err(|source| HarnessError::WorkingDirectory {
            path: working_dir.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(HarnessError::NotADirectory {
            path: working_dir.to_path_buf(),
        });
    }
    Ok(())
}

fn terminate(child: &mut Child) {
    if let Err(error) = child.kill() {
        tracing::debug!(%error, "kill failed; the child has probably exited already");
    }
    if let Err(error) = child.wait() {
        tracing::warn!(%error, "failed to reap killed child");
    }
}

fn launch_failure_exit_code(error: &io::Error) -> i32 {
    match error.kind() {
        io::ErrorKind::NotFound => COMMAND_NOT_FOUND_EXIT_CODE,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED_EXIT_CODE,
        _ => LAUNCH_FAILURE_EXIT_CODE,
    }
}

fn exit_code_from_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

fn render_command_line<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(all(test, unix))]
mod tests {
    use super::{COMMAND_NOT_FOUND_EXIT_CODE, HarnessError, ProcessHarness};
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn run_sh(script: &str, timeout: Duration) -> super::ExecutionOutcome {
        let temp = TempDir::new().expect("tempdir should be created");
        ProcessHarness::new()
            .run("sh", &["-c", script], temp.path(), timeout)
            .expect("harness should run sh")
    }

    #[test]
    fn captures_both_streams_and_exit_code() {
        let outcome = run_sh("echo out; echo err >&2; exit 3", Duration::from_secs(10));

        assert_eq!(outcome.exit_code(), Some(3));
        assert!(!outcome.timed_out());
        assert_eq!(outcome.stdout(), "out\n");
        assert_eq!(outcome.stderr(), "err\n");
        assert!(outcome.output_complete());
        assert_eq!(outcome.command_line(), "sh -c echo out; echo err >&2; exit 3");
    }

    #[test]
    fn drains_multi_megabyte_output_on_both_streams() {
        let script = "dd if=/dev/zero bs=1024 count=3072 2>/dev/null | tr '\\000' e >&2; \
                      dd if=/dev/zero bs=1024 count=3072 2>/dev/null | tr '\\000' o";
        let outcome = run_sh(script, Duration::from_secs(30));

        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(outcome.stderr().len(), 3072 * 1024);
        assert_eq!(outcome.stdout().len(), 3072 * 1024);
        assert!(outcome.stderr().bytes().all(|byte| byte == b'e'));
        assert!(outcome.stdout().bytes().all(|byte| byte == b'o'));
    }

    #[test]
    fn timeout_kills_child_and_keeps_partial_output() {
        let started = Instant::now();
        let outcome = run_sh("echo started; sleep 5; echo finished", Duration::from_millis(300));

        assert!(outcome.timed_out());
        assert_eq!(outcome.exit_code(), None);
        assert!(outcome.stdout().contains("started"));
        assert!(!outcome.stdout().contains("finished"));
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "run should return shortly after the timeout, took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn missing_program_is_a_launch_failure_outcome() {
        let temp = TempDir::new().expect("tempdir should be created");
        let outcome = ProcessHarness::new()
            .run(
                "/definitely/missing/program",
                &["input.csv"],
                temp.path(),
                Duration::from_secs(5),
            )
            .expect("launch failure is reported as an outcome");

        assert!(outcome.launch_failed());
        assert_eq!(outcome.exit_code(), Some(COMMAND_NOT_FOUND_EXIT_CODE));
        assert!(outcome.stderr().contains("failed to launch"));
        assert!(outcome.stderr().contains("/definitely/missing/program"));
    }

    #[test]
    fn missing_working_directory_is_an_infrastructure_error() {
        let result = ProcessHarness::new().run(
            "sh",
            &["-c", "true"],
            Path::new("/definitely/missing/dir"),
            Duration::from_secs(5),
        );

        assert!(matches!(
            result,
            Err(HarnessError::WorkingDirectory { .. })
        ));
    }

    #[test]
    fn unbounded_timeout_and_grace_run_to_completion() {
        let temp = TempDir::new().expect("tempdir should be created");
        let outcome = ProcessHarness::new()
            .with_drain_grace(Duration::MAX)
            .with_poll_interval(Duration::ZERO)
            .run("sh", &["-c", "echo done"], temp.path(), Duration::MAX)
            .expect("an unrepresentable deadline is no deadline");

        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(outcome.stdout(), "done\n");
        assert!(outcome.output_complete());
    }

    #[test]
    fn signal_termination_maps_to_shell_convention() {
        let outcome = run_sh("kill -9 $$", Duration::from_secs(5));
        assert_eq!(outcome.exit_code(), Some(128 + 9));
    }
}
