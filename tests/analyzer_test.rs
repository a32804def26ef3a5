//! Tests for single-repository analysis
//!
//! The analyzer talks to a `mockito` server standing in for the GitHub API.

use mockito::{Matcher, Server, ServerGuard};

use repotree::config::AnalyzerConfig;
use repotree::error::AnalyzerError;
use repotree::services::{Analyze, RepositoryAnalyzer};
use repotree::tree::TreeNode;

fn create_test_analyzer(server: &ServerGuard) -> RepositoryAnalyzer {
    let config = AnalyzerConfig::new("test-token")
        .unwrap()
        .with_api_base_url(&server.url())
        .unwrap();
    RepositoryAnalyzer::from_config(&config).unwrap()
}

const REPOSITORY: &str = r#"{
    "name": "Spoon-Knife",
    "full_name": "octocat/Spoon-Knife",
    "description": "This repo is for demonstration purposes only.",
    "stargazers_count": 12000,
    "forks_count": 150000,
    "watchers_count": 12000,
    "language": "HTML",
    "created_at": "2011-01-27T19:30:43Z",
    "updated_at": "2024-05-01T10:00:00Z",
    "default_branch": "develop",
    "open_issues_count": 3,
    "license": null
}"#;

const TREE: &str = r#"{
    "sha": "d0dd1f61b33d64e29d8bc1372a94ef6a2fee76a9",
    "tree": [
        {"path": "README.md", "mode": "100644", "type": "blob", "sha": "a1"},
        {"path": "index.html", "mode": "100644", "type": "blob", "sha": "a2"},
        {"path": "styles", "mode": "040000", "type": "tree", "sha": "a3"},
        {"path": "styles/main.CSS", "mode": "100644", "type": "blob", "sha": "a4"},
        {"path": "styles/.keep", "mode": "100644", "type": "blob", "sha": "a5"}
    ],
    "truncated": false
}"#;

/// Tests that analysis looks the repository up once and reads the tree of
/// its default branch
#[tokio::test]
async fn test_analyze_repository() {
    let mut server = Server::new_async().await;
    let metadata_mock = server
        .mock("GET", "/repos/octocat/Spoon-Knife")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(REPOSITORY)
        .expect(1)
        .create_async()
        .await;
    let tree_mock = server
        .mock("GET", "/repos/octocat/Spoon-Knife/git/trees/develop")
        .match_query(Matcher::UrlEncoded("recursive".to_string(), "1".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TREE)
        .expect(1)
        .create_async()
        .await;

    let analyzer = create_test_analyzer(&server);
    let result = analyzer
        .analyze_url("https://github.com/octocat/Spoon-Knife.git")
        .await
        .unwrap();

    assert_eq!(result.info.full_name, "octocat/Spoon-Knife");
    assert_eq!(result.info.language.as_deref(), Some("HTML"));
    assert_eq!(result.unique_name(), "octocat__Spoon-Knife");

    assert_eq!(result.structure.len(), 3);
    assert_eq!(result.structure[2].name(), "styles");
    assert_eq!(
        result.structure[2].children(),
        &[TreeNode::file("styles/main.CSS"), TreeNode::file("styles/.keep")]
    );

    assert_eq!(result.summary.file_count, 4);
    assert_eq!(result.summary.directory_count, 1);
    assert_eq!(result.summary.max_depth, 2);
    assert_eq!(result.summary.file_types[".md"], 1);
    assert_eq!(result.summary.file_types[".html"], 1);
    assert_eq!(result.summary.file_types[".css"], 1);
    assert_eq!(result.summary.file_types["no_extension"], 1);

    metadata_mock.assert_async().await;
    tree_mock.assert_async().await;
}

/// Tests that a malformed URL fails before any request is made
#[tokio::test]
async fn test_analyze_invalid_url() {
    let mut server = Server::new_async().await;
    let any_request = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let analyzer = create_test_analyzer(&server);
    let error = analyzer
        .analyze_url("https://github.com/just-an-owner")
        .await
        .unwrap_err();

    assert!(matches!(error, AnalyzerError::InvalidReference { .. }));
    any_request.assert_async().await;
}

/// Tests that a failed tree fetch yields no partial result
#[tokio::test]
async fn test_analyze_fails_when_tree_is_missing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Spoon-Knife")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(REPOSITORY)
        .create_async()
        .await;
    server
        .mock("GET", "/repos/octocat/Spoon-Knife/git/trees/develop")
        .match_query(Matcher::Any)
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Git Repository is empty."}"#)
        .create_async()
        .await;

    let analyzer = create_test_analyzer(&server);
    let error = analyzer
        .analyze_url("github:octocat/Spoon-Knife")
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(409));
    assert_eq!(error.to_string(), "GitHub API error 409: Git Repository is empty.");
}
