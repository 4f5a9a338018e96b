//! Client for upstream git servers.

use axum::http::{header, HeaderMap, Method};
use std::time::Duration;

/// Service advertised by the `info/refs` endpoint.
pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// Request headers copied onto forwarded `git-upload-pack` requests.
///
/// Git gzips larger negotiation bodies, so `Content-Encoding` has to travel
/// with the untouched body.
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::USER_AGENT,
    header::ACCEPT,
    header::CONTENT_TYPE,
    header::CONTENT_ENCODING,
];

/// Connection-pooling HTTP client with a fixed per-request timeout.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vanity/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }

    /// Fetches the upload-pack ref advertisement for `repo_root`.
    pub async fn fetch_refs(&self, repo_root: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(info_refs_url(repo_root)).send().await
    }

    /// Forwards a `git-upload-pack` request to `repo_root`.
    pub async fn upload_pack(
        &self,
        repo_root: &str,
        method: Method,
        headers: &HeaderMap,
        body: reqwest::Body,
    ) -> reqwest::Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method, upload_pack_url(repo_root))
            .body(body);

        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(&name) {
                request = request.header(name, value.clone());
            }
        }

        request.send().await
    }
}

/// `repo_root` without trailing slashes and without a trailing `.git`.
pub fn repo_base(repo_root: &str) -> &str {
    let trimmed = repo_root.trim_end_matches('/');
    trimmed.strip_suffix(".git").unwrap_or(trimmed)
}

/// URL of the upstream ref advertisement.
pub fn info_refs_url(repo_root: &str) -> String {
    format!(
        "{}.git/info/refs?service={UPLOAD_PACK_SERVICE}",
        repo_base(repo_root)
    )
}

/// URL of the upstream upload-pack endpoint.
pub fn upload_pack_url(repo_root: &str) -> String {
    format!("{}.git/{UPLOAD_PACK_SERVICE}", repo_base(repo_root))
}
