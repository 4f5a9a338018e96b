//! End-to-end tests for the git smart HTTP proxy against a mock upstream.

use axum::{body::Body, http::Request};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use vanity_git::{parse_advertisement, PktLine, RefRecord};
use vanity_node::api::{create_router, AppState};
use vanity_node::config::{ServiceSettings, UploadPackMode};
use vanity_node::upstream::UpstreamClient;
use vanity_registry::{MemoryRegistry, PackageEntry};
use vanity_types::PinnedRef;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const T: &str = "1111111111111111111111111111111111111111";
const P: &str = "2222222222222222222222222222222222222222";

const ADVERTISEMENT: &str = "application/x-git-upload-pack-advertisement";

fn frame(line: &str) -> Vec<u8> {
    PktLine::from_string(line).encode().unwrap()
}

/// `HEAD` and master at A, feature at B, annotated tag v1.0.0 peeling to P.
fn upstream_advertisement() -> Vec<u8> {
    let mut data = frame("# service=git-upload-pack\n");
    data.extend_from_slice(b"0000");
    data.extend(frame(&format!(
        "{A} HEAD\0multi_ack side-band-64k ofs-delta symref=HEAD:refs/heads/master agent=git/2.43.0\n"
    )));
    data.extend(frame(&format!("{B} refs/heads/feature\n")));
    data.extend(frame(&format!("{A} refs/heads/master\n")));
    data.extend(frame(&format!("{T} refs/tags/v1.0.0\n")));
    data.extend(frame(&format!("{P} refs/tags/v1.0.0^{{}}\n")));
    data.extend_from_slice(b"0000");
    data
}

fn package(domain_path: &str, repo_root: String, pin: Option<PinnedRef>) -> PackageEntry {
    let mut entry = PackageEntry::new("example.com", domain_path, repo_root);
    entry.pin = pin;
    entry
}

fn create_app(upstream: &str, mode: UploadPackMode, timeout: Duration) -> axum::Router {
    create_app_with(
        upstream,
        ServiceSettings {
            upload_pack_mode: mode,
            ..ServiceSettings::default()
        },
        timeout,
    )
}

fn create_app_with(upstream: &str, settings: ServiceSettings, timeout: Duration) -> axum::Router {
    let registry = MemoryRegistry::from_entries([
        package("/plain", format!("{upstream}/acme/foo"), None),
        package(
            "/branch",
            format!("{upstream}/acme/foo.git/"),
            Some(PinnedRef::branch("feature").unwrap()),
        ),
        package(
            "/tag",
            format!("{upstream}/acme/foo"),
            Some(PinnedRef::tag("v1.0.0").unwrap()),
        ),
        package(
            "/missing-ref",
            format!("{upstream}/acme/foo"),
            Some(PinnedRef::branch("nope").unwrap()),
        ),
        package(
            "/broken",
            format!("{upstream}/acme/broken"),
            Some(PinnedRef::branch("feature").unwrap()),
        ),
        package("/gone", format!("{upstream}/acme/gone"), None),
        package(
            "/gone-pinned",
            format!("{upstream}/acme/gone"),
            Some(PinnedRef::branch("feature").unwrap()),
        ),
    ])
    .unwrap();

    let state = AppState::new(
        Arc::new(registry),
        UpstreamClient::new(timeout).unwrap(),
        settings,
    );
    create_router(state)
}

async fn mock_upstream() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/foo.git/info/refs"))
        .and(query_param("service", "git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(upstream_advertisement(), ADVERTISEMENT))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/acme/broken.git/info/refs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"00zzgarbage".to_vec(), ADVERTISEMENT))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/acme/gone.git/info/refs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

fn info_refs(package: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(format!("{package}/info/refs?service=git-upload-pack"))
        .header("host", "example.com")
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes_of(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn refs(data: &[u8]) -> Vec<RefRecord<'_>> {
    parse_advertisement(data)
        .unwrap()
        .iter()
        .filter_map(|f| f.as_ref_record().copied())
        .collect()
}

#[tokio::test]
async fn test_info_refs_branch_pin() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/branch")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], ADVERTISEMENT);

    let body = body_bytes_of(response).await;
    assert!(body.starts_with(b"001e# service=git-upload-pack\n0000"));

    let records = refs(&body);
    assert_eq!(records[0].name, "HEAD");
    assert_eq!(records[0].oid, B);
    let caps = records[0].capabilities.unwrap();
    assert!(caps.starts_with("symref=HEAD:refs/heads/master "));
    assert!(caps.contains("oldref=HEAD:refs/heads/master"));

    assert_eq!(records[1].name, "refs/heads/master");
    assert_eq!(records[1].oid, B);
    assert_eq!(
        records.iter().filter(|r| r.name == "refs/heads/master").count(),
        1
    );
    assert!(records
        .iter()
        .any(|r| r.name == "refs/heads/feature" && r.oid == B));
}

#[tokio::test]
async fn test_info_refs_annotated_tag_pin() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/tag")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = body_bytes_of(response).await;
    let records = refs(&body);
    assert_eq!(records[0].name, "HEAD");
    assert_eq!(records[0].oid, P);
    assert!(!records[0].capabilities.unwrap().contains("symref="));
    assert_eq!(records[1].name, "refs/heads/master");
    assert_eq!(records[1].oid, P);
}

#[tokio::test]
async fn test_info_refs_missing_ref() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/missing-ref")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(body_bytes_of(response).await, b"Not Found: branch nope");
}

#[tokio::test]
async fn test_info_refs_unpinned_passthrough() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/plain")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], ADVERTISEMENT);
    assert_eq!(body_bytes_of(response).await, upstream_advertisement());
}

#[tokio::test]
async fn test_info_refs_unpinned_relays_upstream_status() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/gone")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(body_bytes_of(response).await, b"404 Not Found");
}

#[tokio::test]
async fn test_info_refs_pinned_upstream_failure_is_500() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/gone-pinned")).await.unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_info_refs_malformed_upstream_is_500() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/broken")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(body_bytes_of(response).await, b"Internal Server Error");
}

#[tokio::test]
async fn test_info_refs_unknown_package_falls_through() {
    let server = mock_upstream().await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));

    let response = app.oneshot(info_refs("/unknown")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(
        body_bytes_of(response).await,
        b"Not Found: package example.com/unknown/info/refs"
    );

    // nothing reached the upstream
    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_info_refs_upstream_unreachable() {
    let app = create_app("http://127.0.0.1:1", UploadPackMode::Proxy, Duration::from_secs(5));

    let response = app.oneshot(info_refs("/branch")).await.unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_info_refs_upstream_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/foo.git/info/refs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(upstream_advertisement(), ADVERTISEMENT)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_millis(200));

    let response = app.oneshot(info_refs("/branch")).await.unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_upload_pack_is_proxied() {
    let server = MockServer::start().await;
    let want = frame(&format!("want {B} side-band-64k\n"))
        .into_iter()
        .chain(*b"00000009done\n")
        .collect::<Vec<u8>>();

    Mock::given(method("POST"))
        .and(path("/acme/foo.git/git-upload-pack"))
        .and(header("content-type", "application/x-git-upload-pack-request"))
        .and(header("user-agent", "git/2.43.0"))
        .and(body_bytes(want.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"0008NAK\nPACK...".to_vec(), "application/x-git-upload-pack-result"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));
    let request = Request::builder()
        .method("POST")
        .uri("/branch/git-upload-pack")
        .header("host", "example.com")
        .header("content-type", "application/x-git-upload-pack-request")
        .header("user-agent", "git/2.43.0")
        .header("accept", "application/x-git-upload-pack-result")
        .body(Body::from(want))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/x-git-upload-pack-result"
    );
    assert_eq!(body_bytes_of(response).await, b"0008NAK\nPACK...");
}

#[tokio::test]
async fn test_info_refs_oversized_advertisement_is_500() {
    let server = mock_upstream().await;
    let limit = upstream_advertisement().len() - 1;
    let app = create_app_with(
        &server.uri(),
        ServiceSettings {
            max_advertisement_bytes: limit,
            ..ServiceSettings::default()
        },
        Duration::from_secs(15),
    );

    let response = app.clone().oneshot(info_refs("/branch")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(body_bytes_of(response).await, b"Internal Server Error");

    // unpinned packages stream through and are not capped
    let response = app.oneshot(info_refs("/plain")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(body_bytes_of(response).await, upstream_advertisement());
}

#[tokio::test]
async fn test_info_refs_advertisement_at_limit_is_rewritten() {
    let server = mock_upstream().await;
    let app = create_app_with(
        &server.uri(),
        ServiceSettings {
            max_advertisement_bytes: upstream_advertisement().len(),
            ..ServiceSettings::default()
        },
        Duration::from_secs(15),
    );

    let response = app.oneshot(info_refs("/branch")).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_upload_pack_forwards_content_encoding() {
    let server = MockServer::start().await;
    // gzip magic followed by an arbitrary payload; the proxy must not touch it
    let gzipped = vec![0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad, 0xbe, 0xef];

    Mock::given(method("POST"))
        .and(path("/acme/foo.git/git-upload-pack"))
        .and(header("content-encoding", "gzip"))
        .and(body_bytes(gzipped.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"0008NAK\n".to_vec(), "application/x-git-upload-pack-result"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&server.uri(), UploadPackMode::Proxy, Duration::from_secs(15));
    let request = Request::builder()
        .method("POST")
        .uri("/branch/git-upload-pack")
        .header("host", "example.com")
        .header("content-type", "application/x-git-upload-pack-request")
        .header("content-encoding", "gzip")
        .body(Body::from(gzipped))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(body_bytes_of(response).await, b"0008NAK\n");
}

#[tokio::test]
async fn test_upload_pack_redirect_mode() {
    let app = create_app(
        "https://git.example.org",
        UploadPackMode::Redirect,
        Duration::from_secs(15),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/branch/git-upload-pack")
        .header("host", "example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 301);
    assert_eq!(
        response.headers()["location"],
        "https://git.example.org/acme/foo.git/git-upload-pack"
    );
}

#[tokio::test]
async fn test_upload_pack_unknown_package() {
    let app = create_app(
        "https://git.example.org",
        UploadPackMode::Redirect,
        Duration::from_secs(15),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/nothing/git-upload-pack")
        .header("host", "example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 404);
}
