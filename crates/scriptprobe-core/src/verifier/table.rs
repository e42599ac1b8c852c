use crate::config::ResultSchema;
use crate::domain::ProbeError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ResultLoadError {
    #[error("result file '{}' does not exist", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read result file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ResultLoadError> for ProbeError {
    fn from(error: ResultLoadError) -> Self {
        let message = error.to_string();
        match error {
            ResultLoadError::Missing { .. } => {
                ProbeError::input_validation("INPUT.RESULT_MISSING", message)
            }
            ResultLoadError::Read { .. } => ProbeError::io_system("IO.RESULT_READ", message),
        }
    }
}

/// One data row of the result file, addressed by the file's own header.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    line_number: usize,
    header: Arc<[String]>,
    fields: Vec<String>,
    key_index: Option<usize>,
}

impl ResultRecord {
    /// 1-based line in the result file.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.header.iter().position(|candidate| candidate == column)?;
        self.fields.get(index).map(String::as_str)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column)?.trim().parse().ok()
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column)?.trim().parse().ok()
    }

    /// Value of the schema's key column, when the row has one.
    pub fn key(&self) -> Option<&str> {
        self.fields.get(self.key_index?).map(String::as_str)
    }

    pub(crate) fn render(&self) -> String {
        format!("line {}: {}", self.line_number, self.fields.join(","))
    }
}

/// Parsed snapshot of a result file: header plus data rows.
///
/// Fields are split on `,` without quoting, which is the format the programs
/// under test emit. Blank lines are skipped but still counted for line numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    path: PathBuf,
    header: Arc<[String]>,
    records: Vec<ResultRecord>,
}

impl ResultTable {
    pub fn load(path: &Path, schema: &ResultSchema) -> Result<Self, ResultLoadError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ResultLoadError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                ResultLoadError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let table = Self::parse(path, &content, schema);
        tracing::debug!(
            path = %path.display(),
            records = table.records.len(),
            "result file loaded"
        );
        Ok(table)
    }

    pub fn parse(path: &Path, content: &str, schema: &ResultSchema) -> Self {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.strip_suffix('\r').unwrap_or(line)));

        let header: Arc<[String]> = lines
            .next()
            .map(|(_, line)| split_fields(line))
            .unwrap_or_default()
            .into();
        let key_index = header
            .iter()
            .position(|column| column == &schema.key_column);

        let records = lines
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_number, line)| ResultRecord {
                line_number,
                header: Arc::clone(&header),
                fields: split_fields(line),
                key_index,
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            header,
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.records.iter().filter_map(ResultRecord::key).collect()
    }
}

fn split_fields(line: &str) -> Vec<String> {
    if line.is_empty() {
        return Vec::new();
    }
    line.split(',').map(str::to_string).collect()
}
