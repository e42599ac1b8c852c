use crate::domain::FAILURE_MARKER;
use serde::Serialize;

/// How a single invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The child ran to completion (signal terminations map to `128 + signal`).
    Exited { code: i32 },
    /// The child was killed after exceeding its timeout; no exit code exists.
    TimedOut,
    /// The child could not be started at all.
    LaunchFailed { code: i32 },
}

/// Structured result of one subprocess invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    command_line: String,
    status: ExecutionStatus,
    stdout: String,
    stderr: String,
    wall_time_ms: u64,
    memory_delta_bytes: i64,
    output_complete: bool,
}

impl ExecutionOutcome {
    pub(crate) fn new(
        command_line: String,
        status: ExecutionStatus,
        stdout: String,
        stderr: String,
        wall_time_ms: u64,
        memory_delta_bytes: i64,
        output_complete: bool,
    ) -> Self {
        Self {
            command_line,
            status,
            stdout,
            stderr,
            wall_time_ms,
            memory_delta_bytes,
            output_complete,
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Exit code of the child; `None` when it was killed for exceeding its timeout.
    pub const fn exit_code(&self) -> Option<i32> {
        match self.status {
            ExecutionStatus::Exited { code } | ExecutionStatus::LaunchFailed { code } => {
                Some(code)
            }
            ExecutionStatus::TimedOut => None,
        }
    }

    pub const fn timed_out(&self) -> bool {
        matches!(self.status, ExecutionStatus::TimedOut)
    }

    pub const fn launch_failed(&self) -> bool {
        matches!(self.status, ExecutionStatus::LaunchFailed { .. })
    }

    pub const fn succeeded(&self) -> bool {
        matches!(self.status, ExecutionStatus::Exited { code: 0 })
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub const fn wall_time_ms(&self) -> u64 {
        self.wall_time_ms
    }

    /// Change in the *caller's* resident set size across the invocation.
    ///
    /// This is a loose proxy inherited from the calibration of existing
    /// thresholds: the child is a separate process and its memory is not
    /// observed. The value may be negative.
    pub const fn memory_delta_bytes(&self) -> i64 {
        self.memory_delta_bytes
    }

    /// Absolute value of [`Self::memory_delta_bytes`], the figure limits compare against.
    pub const fn memory_used_bytes(&self) -> u64 {
        self.memory_delta_bytes.unsigned_abs()
    }

    /// `false` when a stream reader had to be abandoned and only a partial
    /// buffer was salvaged.
    pub const fn output_complete(&self) -> bool {
        self.output_complete
    }

    /// The text failure assertions look at: stderr when it has content,
    /// otherwise stdout if it carries the failure marker.
    pub fn error_text(&self) -> &str {
        if !self.stderr.trim().is_empty() {
            return &self.stderr;
        }
        if self.stdout.contains(FAILURE_MARKER) {
            return &self.stdout;
        }
        &self.stderr
    }

    pub const fn is_performance_acceptable(&self, max_time_ms: u64, max_memory_bytes: u64) -> bool {
        self.wall_time_ms <= max_time_ms && self.memory_used_bytes() <= max_memory_bytes
    }

    pub fn summary_line(&self) -> String {
        let status = match self.status {
            ExecutionStatus::Exited { code } => format!("exit code {}", code),
            ExecutionStatus::TimedOut => "timed out".to_string(),
            ExecutionStatus::LaunchFailed { code } => format!("launch failed (exit code {})", code),
        };
        format!(
            "{}: {} in {} ms (memory delta {} bytes, stdout {} bytes, stderr {} bytes)",
            self.command_line,
            status,
            self.wall_time_ms,
            self.memory_delta_bytes,
            self.stdout.len(),
            self.stderr.len()
        )
    }
}

#[cfg(test)]
pub(crate) fn outcome_for_tests(status: ExecutionStatus, stdout: &str, stderr: &str) -> ExecutionOutcome {
    ExecutionOutcome::new(
        "bash program.sh".to_string(),
        status,
        stdout.to_string(),
        stderr.to_string(),
        12,
        -4096,
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::{ExecutionStatus, outcome_for_tests};

    #[test]
    fn timed_out_outcome_has_no_exit_code() {
        let outcome = outcome_for_tests(ExecutionStatus::TimedOut, "partial\n", "");

        assert!(outcome.timed_out());
        assert_eq!(outcome.exit_code(), None);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.stdout(), "partial\n");
    }

    #[test]
    fn error_text_prefers_stderr_then_marked_stdout() {
        let with_stderr = outcome_for_tests(
            ExecutionStatus::Exited { code: 1 },
            "❌ ignored\n",
            "File not found: x.csv\n",
        );
        assert_eq!(with_stderr.error_text(), "File not found: x.csv\n");

        let marked_stdout = outcome_for_tests(
            ExecutionStatus::Exited { code: 1 },
            "❌ Invalid date detected. Terminating.\n",
            "  \n",
        );
        assert_eq!(
            marked_stdout.error_text(),
            "❌ Invalid date detected. Terminating.\n"
        );

        let plain_stdout = outcome_for_tests(ExecutionStatus::Exited { code: 0 }, "done\n", "");
        assert_eq!(plain_stdout.error_text(), "");
    }

    #[test]
    fn memory_limit_compares_absolute_delta() {
        let outcome = outcome_for_tests(ExecutionStatus::Exited { code: 0 }, "", "");

        assert_eq!(outcome.memory_delta_bytes(), -4096);
        assert_eq!(outcome.memory_used_bytes(), 4096);
        assert!(outcome.is_performance_acceptable(12, 4096));
        assert!(!outcome.is_performance_acceptable(11, 4096));
        assert!(!outcome.is_performance_acceptable(12, 4095));
    }

    #[test]
    fn summary_line_names_status() {
        let outcome = outcome_for_tests(ExecutionStatus::LaunchFailed { code: 127 }, "", "");
        assert!(outcome.summary_line().contains("launch failed (exit code 127)"));
    }
}
