use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{AnalyzerError, AnalyzerResult};

/// Owner/name pair identifying a remote repository
///
/// Parsed from a repository URL. The last two non-empty path segments are the
/// owner and the repository name; a trailing `.git` and trailing slashes are
/// dropped. Besides `scheme://host/.../owner/name` URLs the parser accepts:
///
/// - scheme-less URLs (`github.com/owner/name`)
/// - bare `owner/name` pairs
/// - SSH remotes (`git@github.com:owner/name.git`)
/// - the `github:owner/name` shorthand
///
/// # Examples
///
/// ```
/// use repotree::providers::RepositoryReference;
///
/// let reference = RepositoryReference::parse("https://github.com/octocat/Hello-World").unwrap();
/// assert_eq!(reference.owner(), "octocat");
/// assert_eq!(reference.name(), "Hello-World");
/// assert_eq!(reference.full_name(), "octocat/Hello-World");
/// assert_eq!(reference.unique_name(), "octocat__Hello-World");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RepositoryReference {
    owner: String,
    name: String,
}

impl RepositoryReference {
    /// Builds a reference from already separated parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> AnalyzerResult<Self> {
        let owner = owner.into();
        let name = name.into();
        let display = format!("{}/{}", owner, name);
        for part in [&owner, &name] {
            if part.is_empty() || part.contains('/') {
                return Err(AnalyzerError::invalid_reference(
                    &display,
                    "owner and name must be non-empty single path segments",
                ));
            }
        }
        Ok(Self { owner, name })
    }

    /// Parses a repository URL.
    pub fn parse(reference: &str) -> AnalyzerResult<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(AnalyzerError::invalid_reference(
                reference,
                "empty repository reference",
            ));
        }

        let path = if let Some(rest) = trimmed.strip_prefix("github:") {
            rest.to_string()
        } else if trimmed.starts_with("git@") {
            match trimmed.split_once(':') {
                Some((_, rest)) => rest.to_string(),
                None => {
                    return Err(AnalyzerError::invalid_reference(
                        reference,
                        "SSH remote is missing ':' before the repository path",
                    ));
                }
            }
        } else {
            match Url::parse(trimmed) {
                Ok(url) => url.path().to_string(),
                // Not absolute; read the whole reference as a path.
                Err(_) => trimmed
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(trimmed)
                    .to_string(),
            }
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(AnalyzerError::invalid_reference(
                reference,
                "expected at least two path segments (owner and repository name)",
            ));
        }

        let owner = segments[segments.len() - 2];
        let name = segments[segments.len() - 1].trim_end_matches(".git");
        if name.is_empty() {
            return Err(AnalyzerError::invalid_reference(
                reference,
                "repository name is empty",
            ));
        }

        tracing::debug!("Parsed repository reference {} -> {}/{}", reference, owner, name);
        Self::new(owner, name)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// `owner__name`, safe to use in file names.
    pub fn unique_name(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryReference {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
