//! Repository structure analysis for GitHub
//!
//! This library fetches a repository's metadata and full file tree through
//! the GitHub REST API and derives structure statistics from it:
//!
//! - file and directory counts
//! - maximum nesting depth
//! - a histogram of file extensions
//!
//! A batch runner analyzes many repositories in sequence, isolates per
//! repository failures, persists each result as JSON and averages the
//! statistics over the successful analyses.
//!
//! ## Authentication
//!
//! Every request is authenticated. The token is passed explicitly or read
//! from the `GITHUB_TOKEN` environment variable when an [`config::AnalyzerConfig`]
//! is resolved:
//!
//! ```bash
//! export GITHUB_TOKEN=your_github_token
//! ```
//!
//! - **Rate Limits**: 5,000 requests/hour for an authenticated user. When the
//!   quota runs out the client waits for the reset and retries.
//! - **Private Repositories**: Requires a token with `repo` scope
//!
//! ## Usage
//!
//! ```no_run
//! use repotree::{config::AnalyzerConfig, services::RepositoryAnalyzer};
//! use repotree::providers::RepositoryReference;
//!
//! # async fn run() -> repotree::error::AnalyzerResult<()> {
//! let config = AnalyzerConfig::resolve(None)?;
//! let analyzer = RepositoryAnalyzer::from_config(&config)?;
//! let reference = RepositoryReference::parse("https://github.com/octocat/Hello-World")?;
//! let result = analyzer.analyze(&reference).await?;
//! println!("{} files", result.summary.file_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod providers;
pub mod services;
pub mod tree;
