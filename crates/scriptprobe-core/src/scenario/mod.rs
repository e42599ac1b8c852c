//! Given/When/Then composition over one program under test.
//!
//! The stages are distinct types: fixture builders exist only on [`Given`],
//! execution only on [`Ready`], and assertions only on [`Then`]. A `Then` can
//! go back to `Ready` (or `Given`) for another run; every execution clears the
//! previous result file and the verifier snapshot first.
//!
//! Assertions panic with the failed expectation and the execution summary,
//! which is what a test wants. Setup failures (fixture writes, a broken
//! working directory) are returned as [`ProbeError`]s instead.

use crate::config::ProgramConfig;
use crate::domain::{ProbeError, ProbeResult};
use crate::fixtures::FixtureGenerator;
use crate::harness::{ExecutionOutcome, ProcessHarness};
use crate::verifier::{
    Expectation, ExpectationFailure, OutcomeVerifier, RecordSelector, ResultRecord,
    ValueTolerance, VerificationReport, stale_artifacts_in,
};
use globset::GlobSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

struct Pipeline<F> {
    config: ProgramConfig,
    fixture: F,
    harness: ProcessHarness,
    stale_artifacts: GlobSet,
    verifier: OutcomeVerifier,
}

/// Starts a scenario for `config` with `fixture` as its (usually empty) input.
pub fn given<F: FixtureGenerator>(config: ProgramConfig, fixture: F) -> ProbeResult<Given<F>> {
    Given::new(config, fixture)
}

pub struct Given<F> {
    pipeline: Pipeline<F>,
}

impl<F: FixtureGenerator> Given<F> {
    pub fn new(config: ProgramConfig, fixture: F) -> ProbeResult<Self> {
        config.validate()?;
        let stale_artifacts = config.stale_artifact_matcher()?;
        let verifier = OutcomeVerifier::new(config.result_path(), config.schema.clone())
            .with_stale_artifacts(stale_artifacts.clone());

        Ok(Self {
            pipeline: Pipeline {
                config,
                fixture,
                harness: ProcessHarness::default(),
                stale_artifacts,
                verifier,
            },
        })
    }

    pub fn with_harness(mut self, harness: ProcessHarness) -> Self {
        self.pipeline.harness = harness;
        self
    }

    pub fn generate(mut self, count: usize) -> Self {
        self.pipeline.fixture.generate(count);
        self
    }

    pub fn add_record(mut self, record: F::Record) -> Self {
        self.pipeline.fixture.add_record(record);
        self
    }

    pub fn reset(mut self) -> Self {
        self.pipeline.fixture.reset();
        self
    }

    /// Applies fixture-specific builder calls.
    pub fn configure(mut self, build: impl FnOnce(&mut F)) -> Self {
        build(&mut self.pipeline.fixture);
        self
    }

    pub fn fixture(&self) -> &F {
        &self.pipeline.fixture
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.pipeline.config
    }

    /// Writes the fixture into the data directory.
    pub fn when(self) -> ProbeResult<Ready<F>> {
        Ready::flush(self.pipeline)
    }
}

pub struct Ready<F> {
    pipeline: Pipeline<F>,
    fixture_files: Vec<PathBuf>,
}

impl<F: FixtureGenerator> Ready<F> {
    fn flush(pipeline: Pipeline<F>) -> ProbeResult<Self> {
        let fixture_files = pipeline.fixture.flush(&pipeline.config.data_dir)?;
        tracing::debug!(
            data_dir = %pipeline.config.data_dir.display(),
            files = fixture_files.len(),
            records = pipeline.fixture.record_count(),
            "fixture flushed"
        );
        Ok(Self {
            pipeline,
            fixture_files,
        })
    }

    pub fn fixture_files(&self) -> &[PathBuf] {
        &self.fixture_files
    }

    /// Runs the program with the flushed fixture files as its arguments, in
    /// the order the fixture wrote them.
    pub fn execute(self) -> ProbeResult<Then<F>> {
        let inputs = self.fixture_files.clone();
        self.execute_with(inputs)
    }

    /// Runs the program with `args` appended after the script path instead
    /// of the fixture files.
    pub fn execute_with<I, S>(self, args: I) -> ProbeResult<Then<F>>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut pipeline = self.pipeline;
        remove_previous_outputs(&pipeline.config.result_path(), &pipeline.stale_artifacts)?;
        pipeline.verifier.invalidate();

        let (program, leading) = pipeline.config.command_line();
        let arguments = leading
            .into_iter()
            .map(PathBuf::into_os_string)
            .chain(args.into_iter().map(Into::into))
            .collect::<Vec<_>>();

        let outcome = pipeline.harness.run(
            &program,
            &arguments,
            &pipeline.config.working_dir,
            pipeline.config.timeout(),
        )?;

        Ok(Then { pipeline, outcome })
    }
}

pub struct Then<F> {
    pipeline: Pipeline<F>,
    outcome: ExecutionOutcome,
}

impl<F: FixtureGenerator> Then<F> {
    /// Re-flushes the fixture for another execution.
    pub fn when(self) -> ProbeResult<Ready<F>> {
        Ready::flush(self.pipeline)
    }

    /// Returns to fixture building; the next `when()` writes the changes.
    pub fn given(self) -> Given<F> {
        Given {
            pipeline: self.pipeline,
        }
    }
}

impl<F> Then<F> {
    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn verifier(&self) -> &OutcomeVerifier {
        &self.pipeline.verifier
    }

    /// Structural checks on the result file plus this run's outcome.
    pub fn report(&self, expected_rows: Option<usize>) -> VerificationReport {
        self.pipeline
            .verifier
            .structural_report(expected_rows)
            .with_outcome(self.outcome.clone())
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.outcome.wall_time_ms()
    }

    /// Rows in the result file; panics when it cannot be loaded.
    #[track_caller]
    pub fn record_count(&self) -> usize {
        self.snapshot_records().len()
    }

    /// Key values of the result rows, in file order.
    #[track_caller]
    pub fn keys(&self) -> Vec<String> {
        self.snapshot_records()
            .iter()
            .filter_map(ResultRecord::key)
            .map(str::to_string)
            .collect()
    }

    #[track_caller]
    fn snapshot_records(&self) -> &[ResultRecord] {
        match self.pipeline.verifier.table() {
            Ok(table) => table.records(),
            Err(error) => panic!("{}\n{}", error, self.outcome.summary_line()),
        }
    }

    #[track_caller]
    fn enforce(self, result: Expectation) -> Self {
        if let Err(failure) = result {
            panic!(
                "{}\n{}\nstdout: {}\nstderr: {}",
                failure,
                self.outcome.summary_line(),
                self.outcome.stdout().trim_end(),
                self.outcome.stderr().trim_end()
            );
        }
        self
    }

    #[track_caller]
    pub fn exit_code_is(self, expected: i32) -> Self {
        let actual = self.outcome.exit_code();
        let result = if actual == Some(expected) {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "exit code",
                expected.to_string(),
                actual.map_or_else(|| "none (timed out)".to_string(), |code| code.to_string()),
            ))
        };
        self.enforce(result)
    }

    #[track_caller]
    pub fn has_timed_out(self) -> Self {
        let result = if self.outcome.timed_out() {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "execution timed out",
                "a timeout",
                format!("{:?}", self.outcome.status()),
            ))
        };
        self.enforce(result)
    }

    /// The error text (stderr, or marked stdout) contains `fragment`.
    #[track_caller]
    pub fn contains_error(self, fragment: &str) -> Self {
        let error_text = self.outcome.error_text();
        let result = if error_text.contains(fragment) {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "error output contains",
                format!("'{}'", fragment),
                format!("'{}'", error_text.trim_end()),
            ))
        };
        self.enforce(result)
    }

    /// The error text equals `expected` once line breaks are removed.
    #[track_caller]
    pub fn error_is(self, expected: &str) -> Self {
        let actual = self.outcome.error_text().replace(['\r', '\n'], "");
        let result = if actual == expected {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "error output",
                format!("'{}'", expected),
                format!("'{}'", actual),
            ))
        };
        self.enforce(result)
    }

    #[track_caller]
    pub fn execution_time_within(self, max_ms: u64) -> Self {
        let actual = self.outcome.wall_time_ms();
        let result = if actual <= max_ms {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "execution time",
                format!("<= {} ms", max_ms),
                format!("{} ms", actual),
            ))
        };
        self.enforce(result)
    }

    /// Compares the absolute memory delta against `max_bytes`.
    #[track_caller]
    pub fn memory_usage_within(self, max_bytes: u64) -> Self {
        let actual = self.outcome.memory_used_bytes();
        let result = if actual <= max_bytes {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "memory usage",
                format!("<= {} bytes", max_bytes),
                format!("{} bytes", actual),
            ))
        };
        self.enforce(result)
    }

    #[track_caller]
    pub fn performance_is_acceptable(self, max_ms: u64, max_bytes: u64) -> Self {
        let result = if self.outcome.is_performance_acceptable(max_ms, max_bytes) {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                "performance",
                format!("<= {} ms and <= {} bytes", max_ms, max_bytes),
                format!(
                    "{} ms and {} bytes",
                    self.outcome.wall_time_ms(),
                    self.outcome.memory_used_bytes()
                ),
            ))
        };
        self.enforce(result)
    }

    #[track_caller]
    pub fn file_exists(self) -> Self {
        let result = self.pipeline.verifier.check_file_exists();
        self.enforce(result)
    }

    #[track_caller]
    pub fn has_valid_structure(self) -> Self {
        let result = self.pipeline.verifier.check_structure();
        self.enforce(result)
    }

    #[track_caller]
    pub fn contains_record(self, selector: impl Into<RecordSelector>) -> Self {
        let result = self.pipeline.verifier.check_contains(&selector.into());
        self.enforce(result)
    }

    #[track_caller]
    pub fn does_not_contain_record(self, selector: impl Into<RecordSelector>) -> Self {
        let result = self.pipeline.verifier.check_absent(&selector.into());
        self.enforce(result)
    }

    #[track_caller]
    pub fn value_equals(
        self,
        selector: impl Into<RecordSelector>,
        column: &str,
        expected: &str,
    ) -> Self {
        let result = self
            .pipeline
            .verifier
            .check_value_equals(&selector.into(), column, expected);
        self.enforce(result)
    }

    /// Numeric equality within [`ValueTolerance::CENTS`].
    #[track_caller]
    pub fn value_approx(
        self,
        selector: impl Into<RecordSelector>,
        column: &str,
        expected: f64,
    ) -> Self {
        self.value_within(selector, column, expected, ValueTolerance::CENTS)
    }

    #[track_caller]
    pub fn value_within(
        self,
        selector: impl Into<RecordSelector>,
        column: &str,
        expected: f64,
        tolerance: ValueTolerance,
    ) -> Self {
        let result = self.pipeline.verifier.check_value_within(
            &selector.into(),
            column,
            expected,
            tolerance,
        );
        self.enforce(result)
    }

    #[track_caller]
    pub fn has_no_duplicates(self) -> Self {
        let result = self.pipeline.verifier.check_no_duplicate_keys();
        self.enforce(result)
    }

    #[track_caller]
    pub fn is_sorted_by_key(self) -> Self {
        let result = self.pipeline.verifier.check_sorted_by_key();
        self.enforce(result)
    }

    #[track_caller]
    pub fn has_row_count(self, expected: usize) -> Self {
        let result = self.pipeline.verifier.check_row_count(expected);
        self.enforce(result)
    }

    #[track_caller]
    pub fn all_records_satisfy<P>(self, description: &str, predicate: P) -> Self
    where
        P: Fn(&ResultRecord) -> bool,
    {
        let result = self
            .pipeline
            .verifier
            .check_all_records(description, predicate);
        self.enforce(result)
    }

    #[track_caller]
    pub fn all_dates_within_days(self, column: &str, max_days: u64) -> Self {
        let result = self
            .pipeline
            .verifier
            .check_dates_within_days(column, max_days);
        self.enforce(result)
    }

    #[track_caller]
    pub fn all_fields_non_empty(self) -> Self {
        let result = self.pipeline.verifier.check_all_fields_non_empty();
        self.enforce(result)
    }

    #[track_caller]
    pub fn no_stale_artifacts(self) -> Self {
        let result = self.pipeline.verifier.check_no_stale_artifacts();
        self.enforce(result)
    }
}

/// Removes the previous result file and the stale artifacts beside it, the
/// same directory `no_stale_artifacts` inspects.
fn remove_previous_outputs(result_path: &Path, stale: &GlobSet) -> ProbeResult<()> {
    let mut doomed = result_path
        .parent()
        .map(|dir| stale_artifacts_in(dir, stale))
        .unwrap_or_default();
    doomed.push(result_path.to_path_buf());

    for path in doomed {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed previous output"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                return Err(ProbeError::io_system(
                    "IO.HOUSEKEEPING",
                    format!("failed to remove '{}': {}", path.display(), error),
                ));
            }
        }
    }
    Ok(())
}
