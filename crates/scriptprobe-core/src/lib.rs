//! Black-box acceptance testing for CSV/JSON command-line programs.
//!
//! A scenario writes input fixtures, runs the program as a subprocess through
//! [`ProcessHarness`], and checks both the captured [`ExecutionOutcome`] and
//! the program's result file through [`OutcomeVerifier`].

pub mod config;
pub mod domain;
pub mod fixtures;
pub mod harness;
pub mod scenario;
pub mod verifier;

pub use config::{ConfigError, ProgramConfig, ResultSchema};
pub use domain::{FAILURE_MARKER, ProbeError, ProbeErrorCategory, ProbeResult, ProgramKind};
pub use fixtures::{
    AccountEntry, ActiveUsersFixture, FixtureError, FixtureGenerator, MergeUsersFixture,
    Transaction, TransactionFixture, UserEntry,
};
pub use harness::{ExecutionOutcome, ExecutionStatus, HarnessError, ProcessHarness};
pub use scenario::{Given, Ready, Then, given};
pub use verifier::{
    ExpectationFailure, OutcomeVerifier, RecordSelector, ResultRecord, ResultTable,
    ValueTolerance, VerificationReport, render_human_summary,
};
