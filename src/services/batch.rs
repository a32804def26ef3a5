//! Batch analysis over a list of repositories
//!
//! Repositories are analyzed one after another in input order. A failing
//! repository is logged and recorded without stopping the batch; only errors
//! for which [`AnalyzerError::is_fatal_for_batch`] holds end it early.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::{Analyze, ResultStore};
use crate::{
    error::{AnalyzerError, AnalyzerResult},
    tree::StructureSummary,
};

/// Averages over the successfully analyzed repositories of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of successful analyses
    pub total_repositories: usize,
    pub average_file_count: f64,
    pub average_directory_count: f64,
    /// Extension histogram summed over all repositories
    pub file_types: BTreeMap<String, usize>,
}

/// Running totals folded from [`StructureSummary`] values
#[derive(Debug, Clone, Default)]
pub struct BatchTotals {
    repositories: usize,
    files: usize,
    directories: usize,
    file_types: BTreeMap<String, usize>,
}

impl BatchTotals {
    pub fn add(&mut self, summary: &StructureSummary) {
        self.repositories += 1;
        self.files += summary.file_count;
        self.directories += summary.directory_count;
        for (extension, count) in &summary.file_types {
            *self.file_types.entry(extension.clone()).or_insert(0) += count;
        }
    }

    pub fn repositories(&self) -> usize {
        self.repositories
    }

    /// # Errors
    ///
    /// [`AnalyzerError::NoSuccessfulAnalyses`] when nothing was added.
    pub fn summarize(&self) -> AnalyzerResult<BatchSummary> {
        if self.repositories == 0 {
            return Err(AnalyzerError::NoSuccessfulAnalyses);
        }

        let total = self.repositories as f64;
        Ok(BatchSummary {
            total_repositories: self.repositories,
            average_file_count: self.files as f64 / total,
            average_directory_count: self.directories as f64 / total,
            file_types: self.file_types.clone(),
        })
    }
}

/// A repository the batch could not analyze
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Reference as given in the input
    pub reference: String,
    pub error: String,
}

/// Where a successful analysis was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedResult {
    /// `owner/name`
    pub full_name: String,
    pub location: PathBuf,
}

/// Outcome of [`run_batch`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// `None` when no repository succeeded
    pub summary: Option<BatchSummary>,
    pub persisted: Vec<PersistedResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.summary.is_some()
    }
}

/// Analyzes every reference in `urls` and persists each result.
///
/// # Parameters
///
/// * `analyzer` - Analyzer used for each reference
/// * `store` - Destination for results and the final summary
/// * `urls` - Repository URLs, processed in order
///
/// # Returns
///
/// A [`BatchReport`]. When nothing succeeded the `NoSuccessfulAnalyses`
/// condition is logged and the report carries no summary.
///
/// # Errors
///
/// Configuration errors and failures to persist abort the batch, since they
/// would repeat for every remaining repository.
pub async fn run_batch<A, S>(analyzer: &A, store: &S, urls: &[String]) -> AnalyzerResult<BatchReport>
where
    A: Analyze + ?Sized,
    S: ResultStore + ?Sized,
{
    tracing::info!("Starting batch analysis of {} repositories", urls.len());

    let mut totals = BatchTotals::default();
    let mut persisted = Vec::new();
    let mut failures = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        tracing::info!("[{}/{}] Analyzing {}", index + 1, urls.len(), url);

        match analyzer.analyze_url(url).await {
            Ok(result) => {
                let location = store.persist_result(&result)?;
                totals.add(&result.summary);
                persisted.push(PersistedResult {
                    full_name: result.info.full_name,
                    location,
                });
            }
            Err(e) if e.is_fatal_for_batch() => {
                tracing::error!("Aborting batch at {}: {}", url, e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Error analyzing repository {}: {}", url, e);
                failures.push(BatchFailure {
                    reference: url.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let summary = match totals.summarize() {
        Ok(summary) => {
            store.persist_summary(&summary)?;
            Some(summary)
        }
        Err(e) => {
            tracing::error!("{} ({} repositories failed)", e, failures.len());
            None
        }
    };

    tracing::info!(
        "Batch finished: {} succeeded, {} failed",
        persisted.len(),
        failures.len()
    );

    Ok(BatchReport {
        summary,
        persisted,
        failures,
    })
}

/// Reads repository URLs from the first column of a CSV file.
///
/// Fields are trimmed and rows with an empty first field are skipped. Set
/// `has_header` to skip the first row.
pub fn read_repository_list(path: &Path, has_header: bool) -> AnalyzerResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_path(path)?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(0).map(str::trim).filter(|url| !url.is_empty()) {
            urls.push(url.to_string());
        }
    }

    tracing::debug!("Read {} repository references from {}", urls.len(), path.display());
    Ok(urls)
}
