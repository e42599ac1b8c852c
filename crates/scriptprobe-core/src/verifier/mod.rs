//! Observations over a program's declared result file.
//!
//! The file is loaded on first use and cached until [`OutcomeVerifier::invalidate`];
//! every check reads that snapshot, never the file itself, so later edits to
//! the file are not seen within the same run.

mod expectation;
mod report;
mod table;

pub use expectation::{
    Expectation, ExpectationFailure, RecordSelector, ToleranceComparison, ValueTolerance,
    compare_with_tolerance,
};
pub use report::{CheckReport, VerificationReport, render_human_summary};
pub use table::{ResultLoadError, ResultRecord, ResultTable};

use crate::config::{ProgramConfig, ResultSchema};
use chrono::{Days, Local, NaiveDate};
use globset::GlobSet;
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub struct OutcomeVerifier {
    result_path: PathBuf,
    schema: ResultSchema,
    stale_artifacts: GlobSet,
    snapshot: OnceCell<Result<ResultTable, ResultLoadError>>,
}

impl OutcomeVerifier {
    pub fn new(result_path: impl Into<PathBuf>, schema: ResultSchema) -> Self {
        Self {
            result_path: result_path.into(),
            schema,
            stale_artifacts: GlobSet::empty(),
            snapshot: OnceCell::new(),
        }
    }

    pub fn for_config(config: &ProgramConfig) -> Result<Self, crate::config::ConfigError> {
        Ok(Self::new(config.result_path(), config.schema.clone())
            .with_stale_artifacts(config.stale_artifact_matcher()?))
    }

    pub fn with_stale_artifacts(mut self, stale_artifacts: GlobSet) -> Self {
        self.stale_artifacts = stale_artifacts;
        self
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    /// Drops the cached snapshot; the next check reloads the file.
    pub fn invalidate(&mut self) {
        self.snapshot.take();
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.get().is_some()
    }

    pub fn table(&self) -> Result<&ResultTable, &ResultLoadError> {
        self.snapshot
            .get_or_init(|| ResultTable::load(&self.result_path, &self.schema))
            .as_ref()
    }

    fn loaded(&self, expectation: &str) -> Result<&ResultTable, ExpectationFailure> {
        self.table().map_err(|error| {
            ExpectationFailure::new(
                expectation,
                format!("readable result file '{}'", self.result_path.display()),
                error.to_string(),
            )
        })
    }

    /// Like `loaded`, but also requires the schema's key column in the header.
    fn keyed(&self, expectation: &str) -> Result<&ResultTable, ExpectationFailure> {
        let table = self.loaded(expectation)?;
        if table.header().iter().any(|column| column == &self.schema.key_column) {
            return Ok(table);
        }
        Err(ExpectationFailure::new(
            expectation,
            format!("key column '{}' in the header", self.schema.key_column),
            format!(
                "key column '{}' missing from header '{}'",
                self.schema.key_column,
                table.header().join(",")
            ),
        ))
    }

    fn select(&self, expectation: &str, selector: &RecordSelector) -> Result<&ResultRecord, ExpectationFailure> {
        let table = self.loaded(expectation)?;
        table
            .records()
            .iter()
            .find(|record| selector.matches(record))
            .ok_or_else(|| {
                ExpectationFailure::new(
                    expectation,
                    format!("a record matching {}", selector),
                    format!("no match among {} record(s)", table.len()),
                )
            })
    }

    pub fn check_file_exists(&self) -> Expectation {
        match self.table() {
            Ok(_) => Ok(()),
            Err(error) => Err(ExpectationFailure::new(
                "result file exists",
                format!("file '{}'", self.result_path.display()),
                error.to_string(),
            )),
        }
    }

    pub fn check_header(&self) -> Expectation {
        let expectation = "result header matches schema";
        let table = self.loaded(expectation)?;
        if table.header() == self.schema.columns.as_slice() {
            return Ok(());
        }
        Err(ExpectationFailure::new(
            expectation,
            format!("'{}'", self.schema.header_line()),
            format!("'{}'", table.header().join(",")),
        ))
    }

    /// Header, then column count and non-empty key for every row.
    pub fn check_structure(&self) -> Expectation {
        self.check_header()?;

        let expectation = "result rows match schema";
        let table = self.loaded(expectation)?;
        let width = self.schema.columns.len();
        for record in table.records() {
            if record.fields().len() != width {
                return Err(ExpectationFailure::new(
                    expectation,
                    format!("{} column(s) on line {}", width, record.line_number()),
                    format!("{} column(s) in '{}'", record.fields().len(), record.render()),
                ));
            }
            if record.key().is_none_or(|key| key.trim().is_empty()) {
                return Err(ExpectationFailure::new(
                    expectation,
                    format!(
                        "non-empty '{}' on line {}",
                        self.schema.key_column,
                        record.line_number()
                    ),
                    format!("empty key in '{}'", record.render()),
                ));
            }
        }
        Ok(())
    }

    pub fn check_contains(&self, selector: &RecordSelector) -> Expectation {
        self.select("record is present", selector).map(|_| ())
    }

    pub fn check_absent(&self, selector: &RecordSelector) -> Expectation {
        let expectation = "record is absent";
        let table = match selector {
            RecordSelector::Key(_) => self.keyed(expectation)?,
            RecordSelector::Criteria(_) => self.loaded(expectation)?,
        };
        match table.records().iter().find(|record| selector.matches(record)) {
            None => Ok(()),
            Some(record) => Err(ExpectationFailure::new(
                expectation,
                format!("no record matching {}", selector),
                record.render(),
            )),
        }
    }

    pub fn check_value_equals(&self, selector: &RecordSelector, column: &str, expected: &str) -> Expectation {
        let expectation = format!("'{}' of the record matching {}", column, selector);
        let record = self.select(&expectation, selector)?;
        match record.get(column) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(ExpectationFailure::new(
                expectation,
                format!("'{}'", expected),
                format!("'{}'", actual),
            )),
            None => Err(ExpectationFailure::new(
                expectation,
                format!("'{}'", expected),
                format!("no '{}' field in '{}'", column, record.render()),
            )),
        }
    }

    pub fn check_value_within(
        &self,
        selector: &RecordSelector,
        column: &str,
        expected: f64,
        tolerance: ValueTolerance,
    ) -> Expectation {
        let expectation = format!("numeric '{}' of the record matching {}", column, selector);
        let record = self.select(&expectation, selector)?;
        let Some(actual) = record.get_f64(column) else {
            return Err(ExpectationFailure::new(
                expectation,
                format!("{}", expected),
                format!("non-numeric value in '{}'", record.render()),
            ));
        };

        let comparison = compare_with_tolerance(expected, actual, tolerance);
        if comparison.passes {
            return Ok(());
        }
        Err(ExpectationFailure::new(
            expectation,
            format!(
                "{} (abs_tol={}, rel_tol={})",
                expected, tolerance.abs_tol, tolerance.rel_tol
            ),
            format!("{} (abs_diff={:.6})", actual, comparison.abs_diff),
        ))
    }

    pub fn check_no_duplicate_keys(&self) -> Expectation {
        let expectation = "result keys are unique";
        let table = self.keyed(expectation)?;
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        for key in table.keys() {
            if !seen.insert(key) {
                duplicates.push(key);
            }
        }

        if duplicates.is_empty() {
            return Ok(());
        }
        Err(ExpectationFailure::new(
            expectation,
            "no duplicate keys",
            format!("duplicates: {}", duplicates.join(", ")),
        ))
    }

    pub fn check_sorted_by_key(&self) -> Expectation {
        let expectation = "result is sorted ascending by key";
        let table = self.keyed(expectation)?;
        let keys = table.keys();
        match keys.windows(2).find(|pair| pair[0] > pair[1]) {
            None => Ok(()),
            Some(pair) => Err(ExpectationFailure::new(
                expectation,
                format!("'{}' before '{}'", pair[1], pair[0]),
                format!("'{}' before '{}'", pair[0], pair[1]),
            )),
        }
    }

    pub fn check_row_count(&self, expected: usize) -> Expectation {
        let expectation = "result row count";
        let table = self.loaded(expectation)?;
        if table.len() == expected {
            return Ok(());
        }
        Err(ExpectationFailure::new(
            expectation,
            expected.to_string(),
            table.len().to_string(),
        ))
    }

    /// Fails on the first record for which `predicate` is false.
    pub fn check_all_records<P>(&self, description: &str, predicate: P) -> Expectation
    where
        P: Fn(&ResultRecord) -> bool,
    {
        let expectation = format!("every record satisfies {}", description);
        let table = self.loaded(&expectation)?;
        match table.records().iter().find(|record| !predicate(record)) {
            None => Ok(()),
            Some(record) => Err(ExpectationFailure::new(
                expectation,
                description.to_string(),
                record.render(),
            )),
        }
    }

    pub fn check_all_fields_non_empty(&self) -> Expectation {
        self.check_all_records("all fields non-empty", |record| {
            record.fields().len() == self.schema.columns.len()
                && record.fields().iter().all(|field| !field.trim().is_empty())
        })
    }

    /// Every `column` value is an ISO date no older than `max_days` before
    /// today's local date (the boundary day included).
    pub fn check_dates_within_days(&self, column: &str, max_days: u64) -> Expectation {
        let today = Local::now().date_naive();
        let cutoff = today
            .checked_sub_days(Days::new(max_days))
            .unwrap_or(NaiveDate::MIN);
        let description = format!(
            "'{}' on or after {}",
            column,
            cutoff.format(DATE_FORMAT)
        );
        self.check_all_records(&description, |record| {
            record
                .get(column)
                .and_then(|value| NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok())
                .is_some_and(|date| date >= cutoff)
        })
    }

    /// No file in the result directory matches a stale-artifact glob.
    pub fn check_no_stale_artifacts(&self) -> Expectation {
        let expectation = "no stale artifacts remain";
        let leftovers = self.stale_artifacts_present();
        if leftovers.is_empty() {
            return Ok(());
        }
        Err(ExpectationFailure::new(
            expectation,
            "none",
            leftovers
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }

    pub(crate) fn stale_artifacts_present(&self) -> Vec<PathBuf> {
        let Some(dir) = self.result_path.parent() else {
            return Vec::new();
        };
        stale_artifacts_in(dir, &self.stale_artifacts)
    }
}

pub(crate) fn stale_artifacts_in(dir: &Path, matcher: &GlobSet) -> Vec<PathBuf> {
    if matcher.is_empty() {
        return Vec::new();
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut matches = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| matcher.is_match(Path::new(name)))
        })
        .collect::<Vec<_>>();
    matches.sort();
    matches
}
