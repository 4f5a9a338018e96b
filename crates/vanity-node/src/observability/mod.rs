//! # Observability
//!
//! - **Structured logging**: pretty or JSON output through `tracing-subscriber`
//! - **Access log**: one event per request on the `vanity::access` target
//! - **Request IDs**: `x-request-id` propagation and a per-request span
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use vanity_node::observability::{access_log_layer, init_logging, request_id_layer, LogFormat};
//!
//! init_logging("info", LogFormat::Json);
//!
//! let app = router
//!     .layer(middleware::from_fn_with_state(settings, access_log_layer))
//!     .layer(middleware::from_fn(request_id_layer));
//! ```

mod logging;
pub mod middleware;

pub use logging::{init_logging, LogFormat};
pub use middleware::{
    access_log_layer, request_id_layer, AccessLogEntry, RequestId, ACCESS_LOG_TARGET,
    REQUEST_ID_HEADER,
};
