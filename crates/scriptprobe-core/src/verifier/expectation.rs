use super::table::ResultRecord;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A failed expectation, naming what was expected and what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{expectation}: expected {expected}, actual {actual}")]
pub struct ExpectationFailure {
    pub expectation: String,
    pub expected: String,
    pub actual: String,
}

impl ExpectationFailure {
    pub fn new(
        expectation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            expectation: expectation.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub type Expectation = Result<(), ExpectationFailure>;

/// Picks records either by key value or by a set of `column = value` criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    Key(String),
    Criteria(Vec<(String, String)>),
}

impl RecordSelector {
    pub fn key(value: impl Into<String>) -> Self {
        Self::Key(value.into())
    }

    pub fn criteria<I, C, V>(criteria: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<String>,
    {
        Self::Criteria(
            criteria
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }

    pub fn matches(&self, record: &ResultRecord) -> bool {
        match self {
            Self::Key(key) => record.key() == Some(key.as_str()),
            Self::Criteria(criteria) => criteria
                .iter()
                .all(|(column, value)| record.get(column) == Some(value.as_str())),
        }
    }
}

impl Display for RecordSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "key '{}'", key),
            Self::Criteria(criteria) => {
                let rendered = criteria
                    .iter()
                    .map(|(column, value)| format!("{}='{}'", column, value))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", rendered)
            }
        }
    }
}

impl From<&str> for RecordSelector {
    fn from(key: &str) -> Self {
        Self::key(key)
    }
}

impl From<String> for RecordSelector {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RecordSelector {
    fn from(criteria: [(&str, &str); N]) -> Self {
        Self::criteria(criteria)
    }
}

/// Absolute/relative tolerance for numeric value checks.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ValueTolerance {
    #[serde(rename = "absTol")]
    pub abs_tol: f64,
    #[serde(rename = "relTol")]
    pub rel_tol: f64,
    #[serde(rename = "relativeFloor")]
    pub relative_floor: f64,
}

impl ValueTolerance {
    /// Suits values printed with two decimals.
    pub const CENTS: Self = Self {
        abs_tol: 0.005,
        rel_tol: 0.0,
        relative_floor: 1e-12,
    };

    pub const fn absolute(abs_tol: f64) -> Self {
        Self {
            abs_tol,
            rel_tol: 0.0,
            relative_floor: 1e-12,
        }
    }
}

impl Default for ValueTolerance {
    fn default() -> Self {
        Self::CENTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceComparison {
    pub abs_diff: f64,
    pub rel_diff: f64,
    pub passes: bool,
}

pub fn compare_with_tolerance(
    expected: f64,
    actual: f64,
    tolerance: ValueTolerance,
) -> ToleranceComparison {
    if !expected.is_finite() || !actual.is_finite() {
        let passes = expected == actual || (expected.is_nan() && actual.is_nan());
        return ToleranceComparison {
            abs_diff: if passes { 0.0 } else { f64::INFINITY },
            rel_diff: if passes { 0.0 } else { f64::INFINITY },
            passes,
        };
    }

    let abs_diff = (actual - expected).abs();
    let rel_denominator = expected.abs().max(tolerance.relative_floor);
    let rel_diff = abs_diff / rel_denominator;
    let passes = abs_diff <= tolerance.abs_tol || abs_diff <= tolerance.rel_tol * rel_denominator;

    ToleranceComparison {
        abs_diff,
        rel_diff,
        passes,
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordSelector, ValueTolerance, compare_with_tolerance};
    use crate::config::ResultSchema;
    use crate::verifier::table::ResultTable;
    use std::path::Path;

    #[test]
    fn tolerance_uses_expected_value_as_relative_scale() {
        let tolerance = ValueTolerance {
            abs_tol: 0.0,
            rel_tol: 1e-3,
            relative_floor: 1e-12,
        };

        let comparison = compare_with_tolerance(1000.0, 1000.5, tolerance);
        assert!(comparison.passes);
        assert!((comparison.abs_diff - 0.5).abs() < 1e-12);
        assert!((comparison.rel_diff - 5e-4).abs() < 1e-12);

        assert!(!compare_with_tolerance(1000.0, 1002.0, tolerance).passes);
    }

    #[test]
    fn cents_tolerance_accepts_rounding_to_two_decimals() {
        assert!(compare_with_tolerance(100.0, 100.004, ValueTolerance::CENTS).passes);
        assert!(!compare_with_tolerance(100.0, 100.01, ValueTolerance::CENTS).passes);
        assert!(!compare_with_tolerance(100.0, f64::NAN, ValueTolerance::CENTS).passes);
    }

    #[test]
    fn selectors_match_by_key_or_criteria() {
        let table = ResultTable::parse(
            Path::new("averages.csv"),
            "user,month,average\nalice,ALL,100.00\nbob,ALL,200.00\n",
            &ResultSchema::new(["user", "month", "average"], "user"),
        );
        let alice = &table.records()[0];

        assert!(RecordSelector::from("alice").matches(alice));
        assert!(!RecordSelector::from("bob").matches(alice));
        assert!(RecordSelector::from([("user", "alice"), ("month", "ALL")]).matches(alice));
        assert!(!RecordSelector::from([("user", "alice"), ("month", "2025-01")]).matches(alice));

        assert_eq!(RecordSelector::from("alice").to_string(), "key 'alice'");
        assert_eq!(
            RecordSelector::from([("user", "alice"), ("month", "ALL")]).to_string(),
            "[user='alice', month='ALL']"
        );
    }
}
