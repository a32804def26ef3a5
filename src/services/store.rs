//! Persistence of analysis results and batch summaries

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use super::{AnalysisResult, BatchSummary, BatchTotals};
use crate::error::AnalyzerResult;

/// File name prefix of persisted analysis results
pub const RESULT_FILE_PREFIX: &str = "repo_analysis_";

/// File name of the persisted batch summary
pub const SUMMARY_FILE_NAME: &str = "batch_summary.json";

/// Destination for analysis output
///
/// Each method returns the location the record was written to.
pub trait ResultStore: Send + Sync {
    fn persist_result(&self, result: &AnalysisResult) -> AnalyzerResult<PathBuf>;

    fn persist_summary(&self, summary: &BatchSummary) -> AnalyzerResult<PathBuf>;
}

/// Writes pretty-printed JSON files into one directory
///
/// Results are named `repo_analysis_{owner}__{name}.json`, so two repositories
/// sharing a short name under different owners never overwrite each other.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    output_dir: PathBuf,
}

impl JsonFileStore {
    /// Creates the store, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> AnalyzerResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Location a result for `unique_name` is written to.
    pub fn result_path(&self, unique_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.json", RESULT_FILE_PREFIX, unique_name))
    }

    fn write_json<T: serde::Serialize>(&self, path: PathBuf, value: &T) -> AnalyzerResult<PathBuf> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

impl ResultStore for JsonFileStore {
    fn persist_result(&self, result: &AnalysisResult) -> AnalyzerResult<PathBuf> {
        let path = self.write_json(self.result_path(&result.unique_name()), result)?;
        tracing::info!("Results for {} saved to {}", result.info.full_name, path.display());
        Ok(path)
    }

    fn persist_summary(&self, summary: &BatchSummary) -> AnalyzerResult<PathBuf> {
        let path = self.write_json(self.output_dir.join(SUMMARY_FILE_NAME), summary)?;
        tracing::info!("Batch summary saved to {}", path.display());
        Ok(path)
    }
}

/// Recomputes a [`BatchSummary`] from the results persisted in `dir`.
///
/// Every `repo_analysis_*.json` file is read in file name order. Files that
/// cannot be read or decoded are logged and skipped.
///
/// # Errors
///
/// - [`AnalyzerError::Io`](crate::error::AnalyzerError::Io) if `dir` cannot be listed
/// - [`AnalyzerError::NoSuccessfulAnalyses`](crate::error::AnalyzerError::NoSuccessfulAnalyses) if no result could be folded
pub fn aggregate_directory(dir: &Path) -> AnalyzerResult<BatchSummary> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_result = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(RESULT_FILE_PREFIX) && name.ends_with(".json"));
        if is_result && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut totals = BatchTotals::default();
    for path in &paths {
        match read_result(path) {
            Ok(result) => totals.add(&result.summary),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    tracing::info!(
        "Aggregated {} of {} result files in {}",
        totals.repositories(),
        paths.len(),
        dir.display()
    );
    totals.summarize()
}

/// Decodes a persisted result of any tree depth.
///
/// serde_json stops at 128 levels of nesting by default and every directory
/// takes two, so the limit is lifted and the stack grows on demand instead.
fn read_result(path: &Path) -> AnalyzerResult<AnalysisResult> {
    let content = fs::read_to_string(path)?;
    let mut json = serde_json::Deserializer::from_str(&content);
    json.disable_recursion_limit();
    let result = AnalysisResult::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(result)
}
