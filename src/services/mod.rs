//! Repository analysis services
//!
//! [`RepositoryAnalyzer`] combines the GitHub client with the tree statistics
//! to analyze one repository; [`batch`] drives it over a list of references
//! and [`store`] persists what it produces.

pub mod batch;
pub mod store;

pub use batch::{
    BatchFailure, BatchReport, BatchSummary, BatchTotals, PersistedResult, read_repository_list,
    run_batch,
};
pub use store::{JsonFileStore, ResultStore, aggregate_directory};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalyzerConfig,
    error::AnalyzerResult,
    providers::{GithubClient, RepositoryMetadata, RepositoryReference},
    tree::{StructureSummary, TreeNode},
};

/// Everything known about one analyzed repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub info: RepositoryMetadata,
    pub structure: Vec<TreeNode>,
    pub summary: StructureSummary,
}

impl AnalysisResult {
    /// `owner__name` derived from the metadata's full name.
    pub fn unique_name(&self) -> String {
        self.info.full_name.replace('/', "__")
    }
}

/// Analysis of a repository given by URL
///
/// The batch runner depends on this seam rather than on [`RepositoryAnalyzer`]
/// directly.
#[async_trait]
pub trait Analyze: Send + Sync {
    async fn analyze_url(&self, url: &str) -> AnalyzerResult<AnalysisResult>;
}

/// Single-repository analyzer backed by the GitHub API
#[derive(Debug, Clone)]
pub struct RepositoryAnalyzer {
    client: GithubClient,
}

impl RepositoryAnalyzer {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &AnalyzerConfig) -> AnalyzerResult<Self> {
        Ok(Self::new(GithubClient::new(config)?))
    }

    pub fn client(&self) -> &GithubClient {
        &self.client
    }

    /// Fetches metadata and the default-branch tree, then summarizes the tree
    ///
    /// The repository is looked up once: the tree is fetched at the branch the
    /// metadata names.
    ///
    /// # Errors
    ///
    /// The first unrecovered error from either fetch is returned as is. No
    /// partial result is produced.
    pub async fn analyze(&self, reference: &RepositoryReference) -> AnalyzerResult<AnalysisResult> {
        tracing::info!("Analyzing repository {}", reference);

        let info = self.client.fetch_metadata(reference).await?;
        let structure = self
            .client
            .fetch_tree_at(reference, &info.default_branch)
            .await?;
        let summary = StructureSummary::from_nodes(&structure);

        tracing::info!(
            "Analyzed {}: {} files, {} directories, max depth {}",
            info.full_name,
            summary.file_count,
            summary.directory_count,
            summary.max_depth
        );

        Ok(AnalysisResult {
            info,
            structure,
            summary,
        })
    }
}

#[async_trait]
impl Analyze for RepositoryAnalyzer {
    async fn analyze_url(&self, url: &str) -> AnalyzerResult<AnalysisResult> {
        let reference = RepositoryReference::parse(url)?;
        self.analyze(&reference).await
    }
}
