//! HTTP API for the vanity node.
//!
//! Every request lands in one fallback handler that picks a handler from the
//! `Host` header and the path suffix:
//!
//! - the primary domain serves `/health`
//! - `<path>/info/refs` goes to the git proxy, which rewrites the advertisement
//!   for pinned packages
//! - `<path>/git-upload-pack` is forwarded to (or redirected at) the upstream
//! - anything else gets the `go-import` page

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::sync::Arc;
use vanity_registry::{PackageRegistry, RegistryError};
use vanity_types::RefKind;

use crate::config::ServiceSettings;
use crate::health::HealthState;
use crate::observability::{access_log_layer, request_id_layer};
use crate::upstream::UpstreamClient;
use crate::{proxy, resolver};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Package registry.
    pub registry: Arc<dyn PackageRegistry>,
    /// Client for upstream git servers.
    pub upstream: UpstreamClient,
    /// Deployment settings.
    pub settings: Arc<ServiceSettings>,
    /// Liveness bookkeeping.
    pub health: HealthState,
}

impl AppState {
    /// Creates application state.
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        upstream: UpstreamClient,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            registry,
            upstream,
            settings: Arc::new(settings),
            health: HealthState::new(),
        }
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not Found: package {0}")]
    PackageNotFound(String),

    #[error("Not Found: {kind} {name}")]
    RefNotFound { kind: RefKind, name: String },

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("registry lookup for {path} failed: {source}")]
    Registry {
        path: String,
        #[source]
        source: RegistryError,
    },

    #[error("{op} request to upstream {repo_root} failed: {source}")]
    Upstream {
        op: &'static str,
        repo_root: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op} upstream {repo_root} answered {status}")]
    UpstreamStatus {
        op: &'static str,
        repo_root: String,
        status: StatusCode,
    },

    #[error("advertisement from upstream {repo_root} exceeds {limit} bytes")]
    AdvertisementTooLarge { repo_root: String, limit: usize },

    #[error("rewriting refs of {repo_root} for {pin} failed: {source}")]
    Rewrite {
        repo_root: String,
        pin: String,
        #[source]
        source: vanity_git::GitError,
    },

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ApiError {
    /// Status code the client sees.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PackageNotFound(_) | Self::RefNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(middleware::from_fn_with_state(settings, access_log_layer))
        .layer(middleware::from_fn(request_id_layer))
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let host = request_host(&request);
    let host = resolver::strip_port(&host).to_ascii_lowercase();

    if state.settings.is_primary(&host) {
        return primary(&state, request.uri().path());
    }

    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let result = if path.ends_with(proxy::INFO_REFS_SUFFIX) && is_read(&method) {
        proxy::info_refs(&state, &host, &path).await
    } else if path.ends_with(proxy::UPLOAD_PACK_SUFFIX)
        && (is_read(&method) || method == Method::POST)
    {
        proxy::upload_pack(&state, &host, request).await
    } else if is_read(&method) {
        resolver::serve(&state, &host, &path).await.map(Some)
    } else {
        Err(ApiError::MethodNotAllowed(method))
    };

    match result {
        Ok(Some(response)) => response,
        Ok(None) => ApiError::PackageNotFound(format!("{host}{path}")).into_response(),
        Err(err) => err.into_response(),
    }
}

fn primary(state: &AppState, path: &str) -> Response {
    match path {
        "/health" | "/health/live" => Json(state.health.liveness()).into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from("Not Found"),
        )
            .into_response(),
    }
}

fn request_host(request: &Request) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or_else(|| request.uri().host().map(String::from))
        .unwrap_or_default()
}

fn is_read(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}
