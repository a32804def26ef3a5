//! Tests for the GitHub client against a local mock server
//!
//! Every test points the client at a `mockito` server, so no network access
//! or real token is needed. Rate-limit waits go through a manual clock that
//! records the requested durations instead of sleeping.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockito::{Matcher, Server, ServerGuard};
use tokio_test::{assert_err, assert_ok};

use repotree::config::AnalyzerConfig;
use repotree::error::AnalyzerError;
use repotree::providers::{Clock, GithubClient, RepositoryReference};
use repotree::tree::{StructureSummary, TreeNode};

const TOKEN: &str = "test-token";

/// Clock that records sleeps and returns immediately
#[derive(Debug)]
struct ManualClock {
    now: DateTime<Utc>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    fn at(epoch_seconds: i64) -> Arc<Self> {
        Arc::new(Self {
            now: DateTime::from_timestamp(epoch_seconds, 0).unwrap(),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn create_test_client(server: &ServerGuard) -> GithubClient {
    let config = AnalyzerConfig::new(TOKEN)
        .unwrap()
        .with_api_base_url(&server.url())
        .unwrap();
    GithubClient::new(&config).unwrap()
}

fn repository_json(full_name: &str, default_branch: &str) -> String {
    let (_, name) = full_name.split_once('/').unwrap();
    serde_json::json!({
        "id": 1296269,
        "name": name,
        "full_name": full_name,
        "description": null,
        "stargazers_count": 80,
        "forks_count": 9,
        "watchers_count": 80,
        "language": null,
        "created_at": "2011-01-26T19:01:12Z",
        "updated_at": "2011-01-26T19:14:43Z",
        "default_branch": default_branch,
        "open_issues_count": 0,
        "license": null
    })
    .to_string()
}

fn tree_json(entries: &[(&str, &str, &str)], truncated: bool) -> String {
    let tree: Vec<_> = entries
        .iter()
        .map(|(path, kind, sha)| {
            serde_json::json!({
                "path": path,
                "mode": if *kind == "tree" { "040000" } else { "100644" },
                "type": kind,
                "sha": sha,
            })
        })
        .collect();
    serde_json::json!({ "sha": "root", "tree": tree, "truncated": truncated }).to_string()
}

fn rate_limit_json(reset: i64) -> String {
    serde_json::json!({
        "resources": {
            "core": { "limit": 5000, "remaining": 0, "used": 5000, "reset": reset }
        },
        "rate": { "limit": 5000, "remaining": 0, "used": 5000, "reset": reset }
    })
    .to_string()
}

/// Tests that requests carry the credential and API headers and that
/// missing optional fields come back as `None`
#[tokio::test]
async fn test_fetch_metadata() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octocat/Hello-World")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .match_header("accept", "application/vnd.github+json")
        .match_header("x-github-api-version", "2022-11-28")
        .match_header("user-agent", Matcher::Regex("^repotree/".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json("octocat/Hello-World", "master"))
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let metadata = assert_ok!(client.fetch_metadata(&reference).await);

    assert_eq!(metadata.name, "Hello-World");
    assert_eq!(metadata.full_name, "octocat/Hello-World");
    assert_eq!(metadata.stars, 80);
    assert_eq!(metadata.forks, 9);
    assert_eq!(metadata.default_branch, "master");
    assert_eq!(metadata.description, None);
    assert_eq!(metadata.language, None);
    assert_eq!(metadata.license, None);
    mock.assert_async().await;
}

/// Tests that the license name is taken from the nested license object
#[tokio::test]
async fn test_fetch_metadata_with_license() {
    let mut server = Server::new_async().await;
    let mut body: serde_json::Value =
        serde_json::from_str(&repository_json("rust-lang/rust", "master")).unwrap();
    body["license"] = serde_json::json!({ "key": "mit", "name": "MIT License" });
    body["language"] = serde_json::json!("Rust");
    server
        .mock("GET", "/repos/rust-lang/rust")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("rust-lang", "rust").unwrap();
    let metadata = client.fetch_metadata(&reference).await.unwrap();

    assert_eq!(metadata.license.as_deref(), Some("MIT License"));
    assert_eq!(metadata.language.as_deref(), Some("Rust"));
}

/// Tests the flat listing `src` (tree), `src/main.py`, `README` end to end
#[tokio::test]
async fn test_fetch_tree_builds_nested_structure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json("octocat/Hello-World", "main"))
        .expect(1)
        .create_async()
        .await;
    let tree_mock = server
        .mock("GET", "/repos/octocat/Hello-World/git/trees/main")
        .match_query(Matcher::UrlEncoded("recursive".to_string(), "1".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tree_json(
            &[
                ("src", "tree", "t1"),
                ("src/main.py", "blob", "b1"),
                ("README", "blob", "b2"),
            ],
            false,
        ))
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let tree = client.fetch_tree(&reference).await.unwrap();

    assert_eq!(tree.len(), 2);
    assert_eq!(
        tree[0],
        TreeNode::directory("src", vec![TreeNode::file("src/main.py")])
    );
    assert_eq!(tree[1], TreeNode::file("README"));

    let summary = StructureSummary::from_nodes(&tree);
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.directory_count, 1);
    assert_eq!(summary.max_depth, 2);
    assert_eq!(summary.file_types.len(), 2);
    assert_eq!(summary.file_types[".py"], 1);
    assert_eq!(summary.file_types["no_extension"], 1);
    tree_mock.assert_async().await;
}

/// Tests that branch names with slashes keep their separators in the URL
#[tokio::test]
async fn test_fetch_tree_at_branch_with_slash() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octocat/Hello-World/git/trees/release/v1.0")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tree_json(&[("Cargo.toml", "blob", "b1")], false))
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let tree = client.fetch_tree_at(&reference, "release/v1.0").await.unwrap();

    assert_eq!(tree, vec![TreeNode::file("Cargo.toml")]);
    mock.assert_async().await;
}

/// Tests that a truncated listing is completed by fetching the subtrees it
/// left empty
#[tokio::test]
async fn test_truncated_tree_is_expanded() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/owner/big/git/trees/main")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tree_json(
            &[
                ("src", "tree", "sha-src"),
                ("docs", "tree", "sha-docs"),
                ("docs/guide.md", "blob", "b1"),
                ("README.md", "blob", "b2"),
            ],
            true,
        ))
        .expect(1)
        .create_async()
        .await;
    let src_mock = server
        .mock("GET", "/repos/owner/big/git/trees/sha-src")
        .match_query(Matcher::UrlEncoded("recursive".to_string(), "1".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tree_json(
            &[
                ("main.rs", "blob", "b3"),
                ("util", "tree", "sha-util"),
                ("util/mod.rs", "blob", "b4"),
            ],
            false,
        ))
        .expect(1)
        .create_async()
        .await;
    // docs already has children and must not be refetched
    let docs_mock = server
        .mock("GET", "/repos/owner/big/git/trees/sha-docs")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("owner", "big").unwrap();
    let tree = client.fetch_tree_at(&reference, "main").await.unwrap();

    assert_eq!(
        tree,
        vec![
            TreeNode::directory(
                "src",
                vec![
                    TreeNode::file("src/main.rs"),
                    TreeNode::directory("src/util", vec![TreeNode::file("src/util/mod.rs")]),
                ]
            ),
            TreeNode::directory("docs", vec![TreeNode::file("docs/guide.md")]),
            TreeNode::file("README.md"),
        ]
    );

    let summary = StructureSummary::from_nodes(&tree);
    assert_eq!(summary.file_count, 4);
    assert_eq!(summary.directory_count, 3);
    assert_eq!(summary.max_depth, 3);
    src_mock.assert_async().await;
    docs_mock.assert_async().await;
}

/// Tests that a rate-limited call waits until the reported reset and then
/// succeeds
#[tokio::test]
async fn test_rate_limit_waits_for_reset_and_retries() {
    const NOW: i64 = 1_700_000_000;
    const RESET_IN: i64 = 30;

    let mut server = Server::new_async().await;
    let limited = server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_header("x-ratelimit-remaining", "0")
        .with_header("x-ratelimit-reset", &(NOW + RESET_IN).to_string())
        .with_body(r#"{"message":"API rate limit exceeded for user ID 1."}"#)
        .expect(1)
        .create_async()
        .await;
    let recovered = server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json("octocat/Hello-World", "master"))
        .expect(1)
        .create_async()
        .await;
    let quota = server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rate_limit_json(NOW + RESET_IN))
        .expect(1)
        .create_async()
        .await;

    let clock = ManualClock::at(NOW);
    let client = create_test_client(&server).with_clock(clock.clone());
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let metadata = client.fetch_metadata(&reference).await.unwrap();

    assert_eq!(metadata.full_name, "octocat/Hello-World");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(RESET_IN as u64)]);
    limited.assert_async().await;
    recovered.assert_async().await;
    quota.assert_async().await;
}

/// Tests the secondary limit: 429 with a rate-limit message and Retry-After
/// longer than the quota reset
#[tokio::test]
async fn test_secondary_rate_limit_honours_retry_after() {
    const NOW: i64 = 1_700_000_000;

    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(429)
        .with_header("retry-after", "90")
        .with_body(r#"{"message":"You have exceeded a secondary rate limit."}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json("octocat/Hello-World", "master"))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rate_limit_json(NOW + 10))
        .create_async()
        .await;

    let clock = ManualClock::at(NOW);
    let client = create_test_client(&server).with_clock(clock.clone());
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    assert_ok!(client.fetch_metadata(&reference).await);

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
}

/// Tests the wall clock path: a reset already in the past still waits the
/// minimum interval
#[tokio::test]
async fn test_rate_limit_with_system_clock() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"message":"API rate limit exceeded"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/repos/octocat/Hello-World")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json("octocat/Hello-World", "master"))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rate_limit_json(Utc::now().timestamp() - 60))
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let started = std::time::Instant::now();
    assert_ok!(client.fetch_metadata(&reference).await);

    assert!(started.elapsed() >= repotree::providers::github::MIN_RATE_LIMIT_WAIT);
}

/// Tests that not-found and permission errors are returned without retry
#[tokio::test]
async fn test_remote_errors_are_not_retried() {
    let test_cases = [
        (404, r#"{"message":"Not Found"}"#, "Not Found"),
        (403, r#"{"message":"Resource not accessible by integration"}"#, "Resource not accessible by integration"),
        (500, "", "Internal Server Error"),
    ];

    for (status, body, message) in test_cases {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octocat/missing")
            .with_status(status)
            .with_header("x-ratelimit-remaining", "4999")
            .with_body(body)
            .expect(1)
            .create_async()
            .await;

        let client = create_test_client(&server);
        let reference = RepositoryReference::new("octocat", "missing").unwrap();
        let error = assert_err!(client.fetch_metadata(&reference).await);

        match error {
            AnalyzerError::RemoteApi {
                status: Some(got),
                message: got_message,
            } => {
                assert_eq!(got, status as u16);
                assert_eq!(got_message, message);
            }
            other => panic!("Expected RemoteApi for status {}, got {:?}", status, other),
        }
        mock.assert_async().await;
    }
}

/// Tests that a malformed tree listing surfaces as a remote error
#[tokio::test]
async fn test_conflicting_tree_entries() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World/git/trees/main")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tree_json(
            &[("LICENSE", "blob", "b1"), ("LICENSE/inner", "blob", "b2")],
            false,
        ))
        .create_async()
        .await;

    let client = create_test_client(&server);
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();
    let error = client.fetch_tree_at(&reference, "main").await.unwrap_err();

    assert!(matches!(error, AnalyzerError::RemoteApi { status: None, .. }));
    assert!(error.to_string().contains("Malformed tree response"));
}

/// Tests that a request exceeding the timeout fails once with `Timeout`
#[tokio::test]
async fn test_timeout_is_not_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let accepted = connections.clone();
    tokio::spawn(async move {
        // Hold every connection open without answering
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            open.push(socket);
        }
    });

    let config = AnalyzerConfig::new(TOKEN)
        .unwrap()
        .with_api_base_url(&format!("http://{}", address))
        .unwrap()
        .with_request_timeout(Duration::from_millis(200));
    let client = GithubClient::new(&config).unwrap();
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();

    let error = client.fetch_metadata(&reference).await.unwrap_err();

    assert!(
        matches!(error, AnalyzerError::Timeout { ref url } if url.ends_with("/repos/octocat/Hello-World")),
        "unexpected error: {:?}",
        error
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

/// Tests that an error response whose body stalls still reports `Timeout`
#[tokio::test]
async fn test_stalled_error_body_times_out() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            // Promise a longer body than is ever sent
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 100\r\n\r\n{\"mess")
                .await;
            open.push(socket);
        }
    });

    let config = AnalyzerConfig::new(TOKEN)
        .unwrap()
        .with_api_base_url(&format!("http://{}", address))
        .unwrap()
        .with_request_timeout(Duration::from_millis(200));
    let client = GithubClient::new(&config).unwrap();
    let reference = RepositoryReference::new("octocat", "Hello-World").unwrap();

    let error = client.fetch_metadata(&reference).await.unwrap_err();

    assert!(
        matches!(error, AnalyzerError::Timeout { ref url } if url.ends_with("/repos/octocat/Hello-World")),
        "unexpected error: {:?}",
        error
    );
}

/// Tests reading the core quota
#[tokio::test]
async fn test_rate_limit_status() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rate_limit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rate_limit_json(1_700_000_030))
        .create_async()
        .await;

    let client = create_test_client(&server);
    let status = client.rate_limit().await.unwrap();

    assert_eq!(status.limit, 5000);
    assert_eq!(status.remaining, 0);
    assert_eq!(status.reset.timestamp(), 1_700_000_030);
}
