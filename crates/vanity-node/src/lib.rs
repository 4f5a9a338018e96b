//! # Vanity Node
//!
//! Vanity import path server for Go packages.
//!
//! Registered packages map `<fqdn><path>` to an upstream repository. The node
//! answers `go get` with `go-import`/`go-source` meta tags and, for packages
//! pinned to a branch or tag, proxies the git smart HTTP ref advertisement
//! with `HEAD` rewritten to the pinned commit.
//!
//! ```text
//!   GET /pkg?go-get=1 ─────────────► resolver ──► go-import page
//!   GET /pkg/info/refs ────────────► proxy ─────► upstream info/refs ──► rewrite
//!   POST /pkg/git-upload-pack ─────► proxy ─────► upstream (stream or 301)
//!                                      │
//!                                      ▼
//!                               PackageRegistry
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin vanity-node -- --config vanity.yaml
//! ```
//!
//! ## Modules
//!
//! - [`api`] - Router, shared state and error responses
//! - [`resolver`] - Host/path resolution and the `go-import` page
//! - [`proxy`] - `info/refs` rewriting and `git-upload-pack` hand-off
//! - [`upstream`] - Pooled client for upstream git servers
//! - [`config`] - Node configuration
//! - [`observability`] - Logging, access log and request IDs
//! - [`health`] - Liveness endpoint
//!
//! ## Example: Creating an AppState
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vanity_node::api::{create_router, AppState};
//! use vanity_node::config::ServiceSettings;
//! use vanity_node::upstream::UpstreamClient;
//! use vanity_registry::{MemoryRegistry, PackageEntry};
//!
//! let registry = MemoryRegistry::from_entries([PackageEntry::new(
//!     "example.com",
//!     "/foo",
//!     "https://github.com/acme/foo",
//! )])
//! .unwrap();
//!
//! let state = AppState::new(
//!     Arc::new(registry),
//!     UpstreamClient::new(Duration::from_secs(15)).unwrap(),
//!     ServiceSettings::default(),
//! );
//! let app = create_router(state);
//! ```

pub mod api;
pub mod config;
pub mod health;
pub mod observability;
pub mod proxy;
pub mod resolver;
pub mod upstream;
