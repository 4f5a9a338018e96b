//! Git smart HTTP proxy.
//!
//! `info/refs` is fetched from the upstream and, for pinned packages, rewritten
//! so that `HEAD` names the pinned commit. `git-upload-pack` only negotiates
//! object ids the client already received, so it is forwarded untouched or
//! redirected, depending on [`UploadPackMode`].
//!
//! Both handlers return `Ok(None)` when the package does not resolve, leaving
//! the not-found response to the caller.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use vanity_types::PackageResolution;

use crate::api::{ApiError, AppState};
use crate::config::UploadPackMode;
use crate::resolver::resolve_optional;
use crate::upstream::upload_pack_url;

/// Path suffix of ref advertisement requests.
pub const INFO_REFS_SUFFIX: &str = "/info/refs";

/// Path suffix of pack negotiation requests.
pub const UPLOAD_PACK_SUFFIX: &str = "/git-upload-pack";

const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
const RESULT_CONTENT_TYPE: &str = "application/x-git-upload-pack-result";

/// Largest `git-upload-pack` request body accepted for forwarding.
const MAX_UPLOAD_PACK_REQUEST: usize = 32 * 1024 * 1024;

/// Serves `<package>/info/refs?service=git-upload-pack`.
pub async fn info_refs(
    state: &AppState,
    host: &str,
    path: &str,
) -> Result<Option<Response>, ApiError> {
    let package_path = path.strip_suffix(INFO_REFS_SUFFIX).unwrap_or(path);
    let Some(package) = resolve_optional(state, host, package_path).await? else {
        return Ok(None);
    };

    let upstream = state
        .upstream
        .fetch_refs(&package.repo_root)
        .await
        .map_err(|source| upstream_error("info/refs", &package, source))?;
    let status = upstream.status();

    let Some(pin) = &package.pin else {
        if status != StatusCode::OK {
            tracing::debug!(
                repo_root = %package.repo_root,
                status = %status,
                "Relaying upstream info/refs status"
            );
            return Ok(Some(
                (
                    status,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    status.to_string(),
                )
                    .into_response(),
            ));
        }
        return advertisement(Body::from_stream(upstream.bytes_stream())).map(Some);
    };

    if status != StatusCode::OK {
        return Err(ApiError::UpstreamStatus {
            op: "info/refs",
            repo_root: package.repo_root.clone(),
            status,
        });
    }

    let data = read_capped(upstream, state.settings.max_advertisement_bytes, &package).await?;

    let mut rewritten = Vec::with_capacity(data.len() + 128);
    if let Err(source) = vanity_git::rewrite_advertisement(&data, pin, &mut rewritten) {
        if source.is_ref_not_found() {
            tracing::info!(
                package = %package.import_prefix,
                repo_root = %package.repo_root,
                pin = %pin,
                "Pinned ref not advertised upstream"
            );
            return Err(ApiError::RefNotFound {
                kind: pin.kind(),
                name: pin.name().to_string(),
            });
        }
        return Err(ApiError::Rewrite {
            repo_root: package.repo_root.clone(),
            pin: pin.to_string(),
            source,
        });
    }

    advertisement(Body::from(rewritten)).map(Some)
}

/// Serves `<package>/git-upload-pack`.
pub async fn upload_pack(
    state: &AppState,
    host: &str,
    request: Request,
) -> Result<Option<Response>, ApiError> {
    let path = request.uri().path().to_string();
    let package_path = path.strip_suffix(UPLOAD_PACK_SUFFIX).unwrap_or(&path);
    let Some(package) = resolve_optional(state, host, package_path).await? else {
        return Ok(None);
    };

    match state.settings.upload_pack_mode {
        UploadPackMode::Redirect => {
            let mut target = upload_pack_url(&package.repo_root);
            if let Some(query) = request.uri().query() {
                target.push('?');
                target.push_str(query);
            }
            Ok(Some(
                (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, target)]).into_response(),
            ))
        }
        UploadPackMode::Proxy => {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, MAX_UPLOAD_PACK_REQUEST)
                .await
                .map_err(ApiError::RequestBody)?;

            let upstream = state
                .upstream
                .upload_pack(&package.repo_root, parts.method, &parts.headers, body.into())
                .await
                .map_err(|source| upstream_error("git-upload-pack", &package, source))?;

            let status = upstream.status();
            let content_type = upstream
                .headers()
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(RESULT_CONTENT_TYPE));

            let response = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(upstream.bytes_stream()))?;
            Ok(Some(response))
        }
    }
}

/// Buffers an upstream `info/refs` body, giving up once it passes `limit`.
async fn read_capped(
    mut upstream: reqwest::Response,
    limit: usize,
    package: &PackageResolution,
) -> Result<Vec<u8>, ApiError> {
    let too_large = || {
        tracing::warn!(
            package = %package.import_prefix,
            repo_root = %package.repo_root,
            pin = ?package.pin,
            limit,
            "Upstream advertisement too large"
        );
        ApiError::AdvertisementTooLarge {
            repo_root: package.repo_root.clone(),
            limit,
        }
    };

    if upstream
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(too_large());
    }

    let mut data = Vec::new();
    while let Some(chunk) = upstream
        .chunk()
        .await
        .map_err(|source| upstream_error("info/refs", package, source))?
    {
        if data.len() + chunk.len() > limit {
            return Err(too_large());
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn advertisement(body: Body) -> Result<Response, ApiError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, ADVERTISEMENT_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)?)
}

fn upstream_error(op: &'static str, package: &PackageResolution, source: reqwest::Error) -> ApiError {
    tracing::warn!(
        op,
        package = %package.import_prefix,
        repo_root = %package.repo_root,
        pin = ?package.pin,
        timeout = source.is_timeout(),
        error = %source,
        "Upstream request failed"
    );
    ApiError::Upstream {
        op,
        repo_root: package.repo_root.clone(),
        source,
    }
}
