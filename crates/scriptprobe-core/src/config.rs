//! Program-under-test configuration.
//!
//! Every path the harness touches comes from here; nothing is derived from the
//! process working directory. Configs load from JSON with camelCase keys, and
//! relative paths resolve against the config file's directory (`resultFile`
//! resolves against `dataDir`).

use crate::domain::{ProbeError, ProgramKind};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_INTERPRETER: &str = "bash";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResultSchema {
    pub columns: Vec<String>,
    #[serde(rename = "keyColumn")]
    pub key_column: String,
}

impl ResultSchema {
    pub fn new<I, S>(columns: I, key_column: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            key_column: key_column.into(),
        }
    }

    pub fn for_program(kind: ProgramKind) -> Self {
        Self::new(kind.result_columns().iter().copied(), kind.key_column())
    }

    pub fn header_line(&self) -> String {
        self.columns.join(",")
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|candidate| candidate == column)
    }

    pub fn key_index(&self) -> Option<usize> {
        self.column_index(&self.key_column)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::Invalid(
                "schema must declare at least one column".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if column.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "schema column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "schema column '{}' is declared more than once",
                    column
                )));
            }
        }

        if self.key_index().is_none() {
            return Err(ConfigError::Invalid(format!(
                "key column '{}' is not one of the schema columns [{}]",
                self.key_column,
                self.header_line()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProgramConfig {
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(rename = "scriptPath")]
    pub script_path: PathBuf,
    #[serde(rename = "workingDir", default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(rename = "dataDir")]
    pub data_dir: PathBuf,
    #[serde(rename = "resultFile")]
    pub result_file: PathBuf,
    #[serde(rename = "timeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub schema: ResultSchema,
    #[serde(rename = "staleArtifacts", default = "default_stale_artifacts")]
    pub stale_artifacts: Vec<String>,
}

impl ProgramConfig {
    /// Preset for one of the known programs, run through `bash`.
    pub fn preset(
        kind: ProgramKind,
        script_path: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            interpreter: Some(DEFAULT_INTERPRETER.to_string()),
            script_path: script_path.into(),
            working_dir: data_dir.clone(),
            result_file: PathBuf::from(kind.result_file_name()),
            data_dir,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            schema: ResultSchema::for_program(kind),
            stale_artifacts: default_stale_artifacts(),
        }
    }

    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?;
        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        let config = config.resolve_relative_to(base);
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(config_json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(config_json).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline-config>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_interpreter(mut self, interpreter: Option<&str>) -> Self {
        self.interpreter = interpreter.map(str::to_string);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn result_path(&self) -> PathBuf {
        resolve_against(&self.data_dir, &self.result_file)
    }

    /// Program and leading arguments: `<interpreter> <script>` or `<script>`.
    pub fn command_line(&self) -> (PathBuf, Vec<PathBuf>) {
        match self.interpreter.as_deref().filter(|value| !value.trim().is_empty()) {
            Some(interpreter) => (
                PathBuf::from(interpreter),
                vec![self.script_path.clone()],
            ),
            None => (self.script_path.clone(), Vec::new()),
        }
    }

    pub fn stale_artifact_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.stale_artifacts {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: self.stale_artifacts.join(", "),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.script_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "scriptPath must not be empty".to_string(),
            ));
        }
        self.schema.validate()?;
        self.stale_artifact_matcher()?;
        Ok(())
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        self.script_path = resolve_against(base, &self.script_path);
        self.working_dir = resolve_against(base, &self.working_dir);
        self.data_dir = resolve_against(base, &self.data_dir);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read program config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse program config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid program config: {0}")]
    Invalid(String),
    #[error("invalid stale-artifact glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },
}

impl From<ConfigError> for ProbeError {
    fn from(error: ConfigError) -> Self {
        let message = error.to_string();
        match error {
            ConfigError::Read { .. } => ProbeError::io_system("IO.CONFIG_READ", message),
            ConfigError::Parse { .. }
            | ConfigError::Invalid(_)
            | ConfigError::InvalidGlob { .. } => {
                ProbeError::input_validation("INPUT.CONFIG", message)
            }
        }
    }
}

pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_stale_artifacts() -> Vec<String> {
    vec!["*.tmp".to_string()]
}
