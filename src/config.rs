//! Analyzer configuration
//!
//! Everything the GitHub client needs is carried in an explicit
//! [`AnalyzerConfig`] value built once at startup and passed to the client's
//! constructor. The credential is resolved in this order:
//!
//! 1. an explicitly supplied token (e.g. the `--github-token` CLI flag)
//! 2. the `GITHUB_TOKEN` environment variable
//!
//! Front ends may add an interactive prompt as a last resort. When no source
//! yields a token, construction fails with a configuration error before any
//! network call is attempted.
//!
//! ```bash
//! export GITHUB_TOKEN=your_github_token
//! ```

use std::{fmt, time::Duration};

use url::Url;

use crate::error::{AnalyzerError, AnalyzerResult};

/// Environment variable holding the GitHub token
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Per-request timeout unless overridden
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the GitHub client
#[derive(Clone)]
pub struct AnalyzerConfig {
    github_token: String,
    api_base_url: Url,
    request_timeout: Duration,
    user_agent: String,
}

impl AnalyzerConfig {
    /// Creates a configuration for the public GitHub API.
    pub fn new(github_token: impl Into<String>) -> AnalyzerResult<Self> {
        let github_token = github_token.into().trim().to_string();
        if github_token.is_empty() {
            return Err(AnalyzerError::Configuration(
                "GitHub token is empty".to_string(),
            ));
        }

        let api_base_url = Url::parse(DEFAULT_API_URL)
            .map_err(|e| AnalyzerError::Configuration(format!("Invalid API URL: {}", e)))?;

        Ok(Self {
            github_token,
            api_base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!(
                "repotree/{} (https://github.com/tacogips/repotree)",
                env!("CARGO_PKG_VERSION")
            ),
        })
    }

    /// Resolves the token from `explicit_token`, then from [`TOKEN_ENV_VAR`].
    pub fn resolve(explicit_token: Option<String>) -> AnalyzerResult<Self> {
        let token = explicit_token
            .filter(|token| !token.trim().is_empty())
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                AnalyzerError::Configuration(format!(
                    "GitHub token is required. Pass --github-token or set the {} environment variable. \
                     You can create a token at https://github.com/settings/tokens",
                    TOKEN_ENV_VAR
                ))
            })?;
        Self::new(token)
    }

    /// Points the client at another API root (GitHub Enterprise, test servers).
    pub fn with_api_base_url(mut self, url: &str) -> AnalyzerResult<Self> {
        self.api_base_url = Url::parse(url)
            .map_err(|e| AnalyzerError::Configuration(format!("Invalid API URL '{}': {}", url, e)))?;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn github_token(&self) -> &str {
        &self.github_token
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// First characters of the token, for diagnostics.
    pub fn token_preview(&self) -> String {
        self.github_token.chars().take(4).collect()
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("github_token", &format_args!("{}****", self.token_preview()))
            .field("api_base_url", &self.api_base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
