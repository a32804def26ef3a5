//! Error types for repository analysis.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Main error type for repository analysis.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Missing credential or otherwise unusable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Repository reference could not be parsed
    #[error("Invalid repository reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// API quota exhausted. Consumed by the retry loop, never surfaced by the fetchers.
    #[error("GitHub API rate limit exceeded")]
    RateLimitExceeded {
        /// `retry-after` header of the rejected response, in seconds
        retry_after: Option<u64>,
    },

    /// Any other provider-side failure
    #[error("GitHub API error{}: {message}", status.map(|s| format!(" {}", s)).unwrap_or_default())]
    RemoteApi { status: Option<u16>, message: String },

    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// A batch or aggregation produced nothing to average
    #[error("No successful analyses to summarize")]
    NoSuccessfulAnalyses,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Repository list could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalyzerError {
    pub(crate) fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_reference(reference: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error must stop a whole batch rather than a single item.
    ///
    /// Configuration problems and local persistence failures would repeat for
    /// every remaining repository.
    #[must_use]
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Io(_) | Self::Serialization(_)
        )
    }

    /// HTTP status reported by the provider, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<crate::tree::TreeBuildError> for AnalyzerError {
    fn from(e: crate::tree::TreeBuildError) -> Self {
        Self::remote(None, format!("Malformed tree response: {}", e))
    }
}
