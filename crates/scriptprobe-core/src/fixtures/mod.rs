//! Input fixtures for the programs under test.
//!
//! A fixture holds two kinds of records: synthesized ones produced by
//! [`FixtureGenerator::generate`] (replaced on every call) and explicit ones
//! added by hand (kept verbatim, in insertion order). Files are written with
//! the synthesized records first. Every file is written to a temporary file in
//! the target directory and renamed into place, so a reader never sees a
//! half-written fixture.

pub mod active_users;
pub mod merge_users;
pub mod transactions;

pub use active_users::{AccountEntry, ActiveUsersFixture};
pub use merge_users::{MergeUsersFixture, UserEntry};
pub use transactions::{Transaction, TransactionFixture};

use crate::domain::ProbeError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub type FixtureResult<T> = Result<T, FixtureError>;

pub trait FixtureGenerator {
    type Record;

    /// Drops every record, synthesized and explicit.
    fn reset(&mut self);

    fn add_record(&mut self, record: Self::Record);

    /// Replaces the synthesized records with `count` fresh ones.
    fn generate(&mut self, count: usize);

    fn record_count(&self) -> usize;

    /// Writes the fixture files into `dir`, creating it when needed, and
    /// returns the written paths.
    fn flush(&self, dir: &Path) -> FixtureResult<Vec<PathBuf>>;
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to create fixture directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write fixture '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize fixture '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<FixtureError> for ProbeError {
    fn from(error: FixtureError) -> Self {
        ProbeError::io_system("IO.FIXTURE_WRITE", error.to_string())
    }
}

/// Synthesized records followed by explicit ones.
#[derive(Debug, Clone)]
pub(crate) struct RecordSet<R> {
    synthesized: Vec<R>,
    explicit: Vec<R>,
}

impl<R> Default for RecordSet<R> {
    fn default() -> Self {
        Self {
            synthesized: Vec::new(),
            explicit: Vec::new(),
        }
    }
}

impl<R> RecordSet<R> {
    pub(crate) fn clear(&mut self) {
        self.synthesized.clear();
        self.explicit.clear();
    }

    pub(crate) fn push_explicit(&mut self, record: R) {
        self.explicit.push(record);
    }

    pub(crate) fn replace_synthesized(&mut self, records: Vec<R>) {
        self.synthesized = records;
    }

    pub(crate) fn extend_synthesized(&mut self, records: impl IntoIterator<Item = R>) {
        self.synthesized.extend(records);
    }

    pub(crate) fn synthesized(&self) -> &[R] {
        &self.synthesized
    }

    pub(crate) fn len(&self) -> usize {
        self.synthesized.len() + self.explicit.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &R> {
        self.synthesized.iter().chain(self.explicit.iter())
    }
}

pub(crate) fn fixture_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> FixtureResult<()> {
    fs::create_dir_all(dir).map_err(|source| FixtureError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes `contents` to `dir/file_name` through a same-directory temporary
/// file and an atomic rename.
pub(crate) fn write_atomic(dir: &Path, file_name: &str, contents: &str) -> FixtureResult<PathBuf> {
    let path = dir.join(file_name);
    let write_error = |source: std::io::Error| FixtureError::Write {
        path: path.clone(),
        source,
    };

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    staged.write_all(contents.as_bytes()).map_err(write_error)?;
    staged.flush().map_err(write_error)?;
    staged
        .persist(&path)
        .map_err(|persist| write_error(persist.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "fixture written");
    Ok(path)
}

pub(crate) fn write_json<T: serde::Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> FixtureResult<PathBuf> {
    let mut rendered =
        serde_json::to_string_pretty(value).map_err(|source| FixtureError::Serialize {
            path: dir.join(file_name),
            source,
        })?;
    rendered.push('\n');
    write_atomic(dir, file_name, &rendered)
}
