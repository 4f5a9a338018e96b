//! Request ID propagation and access logging.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ServiceSettings;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Target of access log events.
pub const ACCESS_LOG_TARGET: &str = "vanity::access";

const ABSENT: &str = "-";

/// Request ID extension type.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Adds a request ID to every request and runs the rest of the stack in a
/// span carrying it.
pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);
    }

    response
}

/// Emits one access log event per request.
pub async fn access_log_layer(
    State(settings): State<Arc<ServiceSettings>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let entry = AccessLogEntry::from_request(&request, settings.scheme());

    let response = next.run(request).await;

    entry.emit(response.status(), start.elapsed());
    response
}

/// Request fields recorded in the access log. Absent values are `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub request_id: String,
    pub remote_addr: String,
    pub forwarded_ips: String,
    pub method: String,
    pub url: String,
    pub proto: String,
    pub referrer: String,
    pub user_agent: String,
}

impl AccessLogEntry {
    /// Captures the request side of the entry.
    pub fn from_request(request: &Request, scheme: &str) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        let url = if uri.scheme().is_some() {
            uri.to_string()
        } else {
            let host = header_value(headers, header::HOST)
                .or_else(|| uri.authority().map(|a| a.to_string()))
                .unwrap_or_else(|| ABSENT.to_string());
            let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
            format!("{scheme}://{host}{path}")
        };

        let forwarded_ips = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            request_id: request
                .extensions()
                .get::<RequestId>()
                .map(|RequestId(id)| id.clone())
                .unwrap_or_else(|| ABSENT.to_string()),
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string())
                .unwrap_or_else(|| ABSENT.to_string()),
            forwarded_ips: or_absent(Some(forwarded_ips)),
            method: request.method().to_string(),
            url,
            proto: format!("{:?}", request.version()),
            referrer: or_absent(header_value(headers, header::REFERER)),
            user_agent: or_absent(header_value(headers, header::USER_AGENT)),
        }
    }

    /// Emits the completed entry.
    pub fn emit(&self, status: StatusCode, elapsed: Duration) {
        tracing::info!(
            target: ACCESS_LOG_TARGET,
            request_id = %self.request_id,
            remote_addr = %self.remote_addr,
            forwarded_ips = %self.forwarded_ips,
            method = %self.method,
            url = %self.url,
            proto = %self.proto,
            status = status.as_u16(),
            duration = elapsed.as_secs_f64(),
            referrer = %self.referrer,
            user_agent = %self.user_agent,
            "request"
        );
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn or_absent(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| ABSENT.to_string())
}
