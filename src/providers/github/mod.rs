//! GitHub REST client for repository metadata and trees
//!
//! # Endpoints
//!
//! - `GET /repos/{owner}/{repo}` for metadata and the default branch
//! - `GET /repos/{owner}/{repo}/git/trees/{tree}?recursive=1` for trees, by
//!   branch name or by subtree SHA
//! - `GET /rate_limit` for the quota reset time
//!
//! # Rate Limiting
//!
//! Every call goes through [`GithubClient::get_json`]. When GitHub reports an
//! exhausted quota the client looks up the reset time, waits until then via
//! its [`Clock`] and retries the same call. There is no retry budget: each
//! retry is preceded by a fresh wait computed from the current quota. Other
//! failures, timeouts included, are returned immediately.

mod rate_limit;

pub use rate_limit::{Clock, MIN_RATE_LIMIT_WAIT, SystemClock, wait_until_reset};

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use strum::Display;

use super::{RateLimitStatus, RepositoryMetadata, RepositoryReference};
use crate::{
    config::AnalyzerConfig,
    error::{AnalyzerError, AnalyzerResult},
    tree::{TreeBuilder, TreeNode},
};

/// GitHub-specific repository response
#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    full_name: String,
    description: Option<String>,
    stargazers_count: u64,
    forks_count: u64,
    watchers_count: u64,
    language: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    default_branch: String,
    open_issues_count: u64,
    license: Option<GitHubLicense>,
}

/// GitHub-specific license information
#[derive(Debug, Deserialize)]
struct GitHubLicense {
    name: String,
}

/// GitHub git tree response
#[derive(Debug, Deserialize)]
struct GitHubTreeResponse {
    tree: Vec<GitHubTreeEntry>,
    /// Set when the listing exceeded GitHub's size limit
    #[serde(default)]
    truncated: bool,
}

/// GitHub git tree entry, path relative to the requested tree
#[derive(Debug, Deserialize)]
struct GitHubTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: GitObjectKind,
    sha: String,
}

/// Object type of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
enum GitObjectKind {
    Blob,
    Tree,
    /// Submodule
    Commit,
    #[serde(other)]
    Other,
}

/// GitHub `/rate_limit` response
#[derive(Debug, Deserialize)]
struct GitHubRateLimitResponse {
    resources: GitHubRateLimitResources,
}

#[derive(Debug, Deserialize)]
struct GitHubRateLimitResources {
    core: GitHubRateLimitCore,
}

#[derive(Debug, Deserialize)]
struct GitHubRateLimitCore {
    limit: u64,
    remaining: u64,
    #[serde(default)]
    used: u64,
    /// Epoch seconds
    reset: i64,
}

/// Error body returned by GitHub
#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// Client for the GitHub REST API
///
/// Holds the credential and timeout from an [`AnalyzerConfig`]. Requests are
/// issued one at a time; the client has no shared mutable state.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_base_url: String,
    clock: Arc<dyn Clock>,
}

impl GithubClient {
    /// Creates a client using the wall clock.
    pub fn new(config: &AnalyzerConfig) -> AnalyzerResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", config.github_token()))
            .map_err(|e| {
                AnalyzerError::Configuration(format!("GitHub token is not a valid header value: {}", e))
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        let client = Client::builder()
            .user_agent(config.user_agent())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AnalyzerError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created GitHub client for {}", config.api_base_url());

        Ok(Self {
            client,
            api_base_url: config.api_base_url().as_str().trim_end_matches('/').to_string(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used for rate-limit waits.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base_url, endpoint.trim_start_matches('/'))
    }

    fn repo_endpoint(reference: &RepositoryReference) -> String {
        format!(
            "repos/{}/{}",
            urlencoding::encode(reference.owner()),
            urlencoding::encode(reference.name())
        )
    }

    /// Sends one GET request and decodes the JSON body.
    ///
    /// Quota exhaustion is reported as [`AnalyzerError::RateLimitExceeded`];
    /// callers normally go through [`Self::get_json`] instead.
    async fn send_once<T: DeserializeOwned>(&self, url: &str) -> AnalyzerResult<T> {
        tracing::debug!("Making GitHub API request to: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response
                .text()
                .await
                .map_err(|e| transport_error(url, e))?;
            let message = error_message(&body, status);

            if rate_limit::is_rate_limited(status, &headers, &message) {
                return Err(AnalyzerError::RateLimitExceeded {
                    retry_after: rate_limit::header_u64(&headers, "retry-after"),
                });
            }

            return Err(AnalyzerError::remote(Some(status.as_u16()), message));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                AnalyzerError::Timeout {
                    url: url.to_string(),
                }
            } else {
                AnalyzerError::remote(None, format!("Failed to parse GitHub response from {}: {}", url, e))
            }
        })
    }

    /// GET with the rate-limit wait-and-retry policy.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AnalyzerResult<T> {
        loop {
            match self.send_once(url).await {
                Err(AnalyzerError::RateLimitExceeded { retry_after }) => {
                    self.wait_for_quota_reset(retry_after).await?;
                    tracing::info!("Retrying GitHub API request to: {}", url);
                }
                other => return other,
            }
        }
    }

    async fn wait_for_quota_reset(&self, retry_after: Option<u64>) -> AnalyzerResult<()> {
        let status = self.rate_limit().await?;
        let wait = wait_until_reset(status.reset, self.clock.now(), retry_after);
        tracing::warn!(
            "GitHub API rate limit exceeded ({}/{} remaining). Waiting {:.1} seconds until {}",
            status.remaining,
            status.limit,
            wait.as_secs_f64(),
            status.reset
        );
        self.clock.sleep(wait).await;
        Ok(())
    }

    /// Current core quota.
    pub async fn rate_limit(&self) -> AnalyzerResult<RateLimitStatus> {
        let url = self.api_url("rate_limit");
        let response: GitHubRateLimitResponse = match self.send_once(&url).await {
            Ok(response) => response,
            Err(AnalyzerError::RateLimitExceeded { .. }) => {
                return Err(AnalyzerError::remote(
                    None,
                    "GitHub refused the rate limit status request",
                ));
            }
            Err(e) => return Err(e),
        };

        let core = response.resources.core;
        let reset = DateTime::from_timestamp(core.reset, 0).ok_or_else(|| {
            AnalyzerError::remote(None, format!("Invalid rate limit reset timestamp: {}", core.reset))
        })?;

        Ok(RateLimitStatus {
            limit: core.limit,
            remaining: core.remaining,
            used: core.used,
            reset,
        })
    }

    /// Fetches descriptive metadata for a repository.
    pub async fn fetch_metadata(
        &self,
        reference: &RepositoryReference,
    ) -> AnalyzerResult<RepositoryMetadata> {
        tracing::info!("Fetching repository metadata for {}", reference);

        let url = self.api_url(&Self::repo_endpoint(reference));
        let repo: GitHubRepository = self.get_json(&url).await?;

        Ok(RepositoryMetadata {
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.watchers_count,
            language: repo.language,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            default_branch: repo.default_branch,
            open_issues: repo.open_issues_count,
            license: repo.license.map(|license| license.name),
        })
    }

    /// Fetches the full tree of the repository's default branch.
    pub async fn fetch_tree(&self, reference: &RepositoryReference) -> AnalyzerResult<Vec<TreeNode>> {
        let metadata = self.fetch_metadata(reference).await?;
        self.fetch_tree_at(reference, &metadata.default_branch).await
    }

    /// Fetches the full tree at a branch, tag or tree SHA.
    ///
    /// One recursive call normally returns the whole tree. When GitHub flags
    /// a listing as truncated, each directory that listing left without
    /// children is fetched again by its SHA and grafted under its path.
    pub async fn fetch_tree_at(
        &self,
        reference: &RepositoryReference,
        tree_ref: &str,
    ) -> AnalyzerResult<Vec<TreeNode>> {
        tracing::info!("Fetching GitHub file tree for {} (ref: {})", reference, tree_ref);

        let mut builder = TreeBuilder::new();
        let mut pending = VecDeque::from([(String::new(), tree_ref.to_string())]);
        let mut requests = 0usize;

        while let Some((prefix, tree)) = pending.pop_front() {
            let url = self.api_url(&format!(
                "{}/git/trees/{}?recursive=1",
                Self::repo_endpoint(reference),
                encode_tree_ref(&tree)
            ));
            let response: GitHubTreeResponse = self.get_json(&url).await?;
            requests += 1;

            let mut listed_dirs = Vec::new();
            for entry in response.tree {
                let path = if prefix.is_empty() {
                    entry.path
                } else {
                    format!("{}/{}", prefix, entry.path)
                };
                match entry.kind {
                    GitObjectKind::Tree => {
                        listed_dirs.push((builder.insert_directory(&path)?, entry.sha));
                    }
                    kind => {
                        if kind != GitObjectKind::Blob {
                            tracing::debug!("Treating {} entry '{}' as a file", kind, path);
                        }
                        builder.insert_file(&path)?;
                    }
                }
            }

            if response.truncated {
                let before = pending.len();
                for (id, sha) in listed_dirs {
                    if builder.child_count(id) == 0 {
                        pending.push_back((builder.path(id).to_string(), sha));
                    }
                }
                tracing::warn!(
                    "GitHub file tree was truncated for {} at '{}'; expanding {} subtrees",
                    reference,
                    if prefix.is_empty() { "/" } else { prefix.as_str() },
                    pending.len() - before
                );
            }
        }

        tracing::info!(
            "Retrieved {} tree entries for {} in {} request(s)",
            builder.len(),
            reference,
            requests
        );
        Ok(builder.build())
    }
}

/// Percent-encodes each `/`-separated segment of a branch, tag or SHA.
fn encode_tree_ref(tree_ref: &str) -> String {
    tree_ref
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn transport_error(url: &str, e: reqwest::Error) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout {
            url: url.to_string(),
        }
    } else {
        AnalyzerError::remote(None, format!("Request to {} failed: {}", url, e))
    }
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<GitHubErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
