use super::OutcomeVerifier;
use super::expectation::Expectation;
use crate::harness::ExecutionOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub result_path: String,
    pub check_count: usize,
    pub passed_check_count: usize,
    pub failed_check_count: usize,
    pub checks: Vec<CheckReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub passed: bool,
    pub reason: Option<String>,
}

impl VerificationReport {
    pub fn new(result_path: impl Into<String>) -> Self {
        Self {
            passed: true,
            result_path: result_path.into(),
            check_count: 0,
            passed_check_count: 0,
            failed_check_count: 0,
            checks: Vec::new(),
            outcome: None,
        }
    }

    pub fn record(&mut self, name: &str, result: Expectation) -> &mut Self {
        let passed = result.is_ok();
        self.check_count += 1;
        if passed {
            self.passed_check_count += 1;
        } else {
            self.failed_check_count += 1;
            self.passed = false;
        }
        self.checks.push(CheckReport {
            name: name.to_string(),
            passed,
            reason: result.err().map(|failure| failure.to_string()),
        });
        self
    }

    pub fn with_outcome(mut self, outcome: ExecutionOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn first_failure(&self) -> Option<&CheckReport> {
        self.checks.iter().find(|check| !check.passed)
    }
}

impl OutcomeVerifier {
    /// Runs the structural checks (existence, header and rows, unique keys,
    /// key order and, when given, the row count) into a report.
    pub fn structural_report(&self, expected_rows: Option<usize>) -> VerificationReport {
        let mut report = VerificationReport::new(self.result_path().display().to_string());
        report.record("file_exists", self.check_file_exists());
        if !report.passed {
            return report;
        }

        report
            .record("structure", self.check_structure())
            .record("no_duplicate_keys", self.check_no_duplicate_keys())
            .record("sorted_by_key", self.check_sorted_by_key())
            .record("no_stale_artifacts", self.check_no_stale_artifacts());
        if let Some(expected_rows) = expected_rows {
            report.record("row_count", self.check_row_count(expected_rows));
        }
        report
    }
}

pub fn render_human_summary(report: &VerificationReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Verification status: {}", status));
    lines.push(format!("Result file: {}", report.result_path));
    lines.push(format!(
        "Checks: {} total ({} passed, {} failed)",
        report.check_count, report.passed_check_count, report.failed_check_count
    ));

    if let Some(outcome) = &report.outcome {
        lines.push(format!("Execution: {}", outcome.summary_line()));
    }

    if let Some(first_failure) = report.first_failure() {
        let reason = first_failure
            .reason
            .as_deref()
            .unwrap_or("check failed without a reason");
        lines.push(format!("  first failure: {} ({})", first_failure.name, reason));
    }

    lines.join("\n")
}
