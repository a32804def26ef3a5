//! Remote repository providers
//!
//! Only GitHub is supported. [`RepositoryReference`] identifies a repository,
//! [`GithubClient`] fetches its metadata and tree.

pub mod github;
pub mod models;
mod reference;

pub use github::{Clock, GithubClient, SystemClock};
pub use models::{RateLimitStatus, RepositoryMetadata};
pub use reference::RepositoryReference;
