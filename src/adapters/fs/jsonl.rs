use crate::domain::ports::RecordSource;
use crate::domain::telemetry::{ChangeEvent, NormalizedTelemetryRecord};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::warn;

/// JSON-lines file source: one normalized record or change event per line.
/// Blank lines are ignored and malformed lines are skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct JsonlSource {
    telemetry_path: Option<PathBuf>,
    changes_path: Option<PathBuf>,
}

impl JsonlSource {
    pub fn new(telemetry_path: Option<PathBuf>, changes_path: Option<PathBuf>) -> Self {
        Self {
            telemetry_path,
            changes_path,
        }
    }
}

impl RecordSource for JsonlSource {
    fn telemetry(&self) -> Result<Vec<NormalizedTelemetryRecord>> {
        match &self.telemetry_path {
            Some(path) => read_jsonl(path),
            None => Ok(Vec::new()),
        }
    }

    fn changes(&self) -> Result<Vec<ChangeEvent>> {
        match &self.changes_path {
            Some(path) => read_jsonl(path),
            None => Ok(Vec::new()),
        }
    }
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSONL file: {}", path.display()))?;

    let mut out = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => out.push(item),
            Err(e) => warn!(
                file = %path.display(),
                line = lineno + 1,
                error = %e,
                "skipping malformed line"
            ),
        }
    }
    Ok(out)
}
