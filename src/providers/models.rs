//! Domain models returned by the repository providers
//!
//! These are vendor-agnostic snapshots; provider response shapes are
//! converted into them inside the provider module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive metadata for a single repository
///
/// Optional fields are always present in serialized output, as `null` when
/// the provider has no value, so "not set" is never confused with "omitted".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Repository name (without owner)
    pub name: String,

    /// `owner/name`
    pub full_name: String,

    pub description: Option<String>,

    /// Number of stargazers
    pub stars: u64,

    pub forks: u64,

    pub watchers: u64,

    /// Primary programming language
    pub language: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Branch whose tree is analyzed
    pub default_branch: String,

    pub open_issues: u64,

    /// License display name
    pub license: Option<String>,
}

/// Snapshot of the core API quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    /// When the quota window resets
    pub reset: DateTime<Utc>,
}
