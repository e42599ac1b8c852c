pub mod errors;

pub use errors::{ProbeError, ProbeErrorCategory, ProbeResult};

use std::fmt::{Display, Formatter};

/// Marker the programs under test print in front of human-readable failures.
pub const FAILURE_MARKER: &str = "❌";

/// The three command-line programs this harness knows presets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    CalculateAverage,
    CheckActiveUsers,
    MergeUsers,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [
        Self::CalculateAverage,
        Self::CheckActiveUsers,
        Self::MergeUsers,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CalculateAverage => "calculate_average",
            Self::CheckActiveUsers => "check_active_users",
            Self::MergeUsers => "merge_users",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub const fn result_file_name(self) -> &'static str {
        match self {
            Self::CalculateAverage => "averages.csv",
            Self::CheckActiveUsers => "active_users.csv",
            Self::MergeUsers => "full_users.csv",
        }
    }

    pub const fn result_columns(self) -> &'static [&'static str] {
        match self {
            Self::CalculateAverage => &["user", "month", "average"],
            Self::CheckActiveUsers => &["login", "last_login"],
            Self::MergeUsers => &["login", "name", "email"],
        }
    }

    pub const fn key_column(self) -> &'static str {
        match self {
            Self::CalculateAverage => "user",
            Self::CheckActiveUsers | Self::MergeUsers => "login",
        }
    }
}

impl Display for ProgramKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}
