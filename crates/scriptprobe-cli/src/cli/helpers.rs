use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub(super) fn write_report_json<T: Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create report directory '{}'", parent.display())
        })?;
    }

    let mut content =
        serde_json::to_string_pretty(report).context("failed to serialize JSON report")?;
    content.push('\n');
    fs::write(path, content)
        .with_context(|| format!("failed to write JSON report '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote JSON report");
    Ok(())
}

/// Indents captured child output so it reads as a block under its heading.
pub(super) fn indent_block(text: &str) -> String {
    text.lines()
        .map(|line| format!("  | {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
