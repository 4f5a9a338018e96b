//! Node configuration.
//!
//! Values come from an optional YAML file, then `VANITY_*` environment
//! variables, then command line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use vanity_registry::PackageEntry;

use crate::observability::LogFormat;

/// Default upstream request timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

/// Default cap on a buffered upstream ref advertisement.
pub const DEFAULT_MAX_ADVERTISEMENT_BYTES: usize = 16 * 1024 * 1024;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How `git-upload-pack` requests are handed to the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadPackMode {
    /// Forward the request body and stream the upstream response back.
    #[default]
    Proxy,
    /// Answer with a permanent redirect to the upstream URL.
    Redirect,
}

/// Configuration for a vanity node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen address.
    pub api_addr: SocketAddr,
    /// The service's own domain. Requests for it are not package lookups.
    pub primary_domain: Option<String>,
    /// Whether the deployment terminates TLS (selects `https` repo roots).
    pub tls: bool,
    /// Upstream git request timeout in seconds.
    pub upstream_timeout_secs: u64,
    /// How `git-upload-pack` is handled.
    pub upload_pack_mode: UploadPackMode,
    /// Largest upstream `info/refs` body buffered for a pinned package.
    pub max_advertisement_bytes: usize,
    /// Log level.
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: LogFormat,
    /// Packages served by the in-memory registry.
    pub packages: Vec<PackageEntry>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            primary_domain: None,
            tls: false,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            upload_pack_mode: UploadPackMode::Proxy,
            max_advertisement_bytes: DEFAULT_MAX_ADVERTISEMENT_BYTES,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            packages: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from `path` (if any) layered with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(config::Environment::with_prefix("VANITY"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "upstream_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_advertisement_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_advertisement_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(domain) = &self.primary_domain {
            if domain.is_empty() || domain.contains('/') || domain.contains(':') {
                return Err(ConfigError::Invalid(format!(
                    "primary_domain {domain:?} must be a bare host name"
                )));
            }
        }
        Ok(())
    }

    /// Upstream request timeout.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Per-request settings shared by the handlers.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            primary_domain: self.primary_domain.as_ref().map(|d| d.to_ascii_lowercase()),
            tls: self.tls,
            upload_pack_mode: self.upload_pack_mode,
            max_advertisement_bytes: self.max_advertisement_bytes,
        }
    }
}

/// Settings the request handlers consult.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// The service's own domain, lowercased.
    pub primary_domain: Option<String>,
    /// Whether pinned repo roots use `https`.
    pub tls: bool,
    /// How `git-upload-pack` is handled.
    pub upload_pack_mode: UploadPackMode,
    /// Largest upstream `info/refs` body buffered for rewriting.
    pub max_advertisement_bytes: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            primary_domain: None,
            tls: false,
            upload_pack_mode: UploadPackMode::default(),
            max_advertisement_bytes: DEFAULT_MAX_ADVERTISEMENT_BYTES,
        }
    }
}

impl ServiceSettings {
    /// Scheme this deployment is reached on.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    /// Returns true if `host` (port already stripped) is the primary domain.
    pub fn is_primary(&self, host: &str) -> bool {
        self.primary_domain
            .as_deref()
            .is_some_and(|primary| primary.eq_ignore_ascii_case(host))
    }
}
