//! Registered package entries.

use crate::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use vanity_types::{PackageResolution, PinnedRef, Vcs};

/// A package registered under a domain and path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Fully qualified domain name the package is served on.
    pub domain: String,
    /// Path under the domain, `""` for the domain root or `/a/b`.
    #[serde(default)]
    pub path: String,
    /// VCS of the upstream repository.
    #[serde(default)]
    pub vcs: Vcs,
    /// Absolute URL of the upstream repository.
    pub repo_root: String,
    /// Optional branch or tag pin.
    #[serde(default)]
    pub pin: Option<PinnedRef>,
    /// `go-source` meta tag content.
    #[serde(default)]
    pub go_source: String,
    /// Browser redirect target.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Disabled packages resolve as not found.
    #[serde(default)]
    pub disabled: bool,
}

impl PackageEntry {
    /// Creates an unpinned git package.
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        repo_root: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            vcs: Vcs::Git,
            repo_root: repo_root.into(),
            pin: None,
            go_source: String::new(),
            redirect_url: None,
            disabled: false,
        }
    }

    /// Returns `<domain><path>`.
    pub fn import_prefix(&self) -> String {
        format!("{}{}", self.domain, self.path)
    }

    /// Checks the entry and normalizes its domain and path.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        self.domain = self.domain.trim().to_ascii_lowercase();
        self.path = self.path.trim().trim_end_matches('/').to_string();

        validate_domain(&self.domain)?;
        validate_path(&self.path)?;

        let url = url::Url::parse(&self.repo_root)
            .map_err(|e| RegistryError::InvalidPackage(format!("repo root {:?}: {e}", self.repo_root)))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(RegistryError::InvalidPackage(format!(
                "repo root {:?} is not an absolute URL",
                self.repo_root
            )));
        }

        if let Some(redirect) = &self.redirect_url {
            url::Url::parse(redirect).map_err(|e| {
                RegistryError::InvalidPackage(format!("redirect url {redirect:?}: {e}"))
            })?;
        }

        if self.pin.is_some() && self.vcs != Vcs::Git {
            tracing::warn!(
                package = %self.import_prefix(),
                vcs = %self.vcs,
                "Ref pin on a non-git package will only be honoured by git clients"
            );
        }

        Ok(self)
    }

    /// Returns true if `path` is this entry's path or lies beneath it.
    pub(crate) fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub(crate) fn to_resolution(&self) -> PackageResolution {
        PackageResolution {
            import_prefix: self.import_prefix(),
            vcs: self.vcs,
            repo_root: self.repo_root.clone(),
            pin: self.pin.clone(),
            go_source: self.go_source.clone(),
            redirect_url: self.redirect_url.clone(),
            disabled: self.disabled,
        }
    }
}

fn validate_domain(domain: &str) -> Result<()> {
    let valid = !domain.is_empty()
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidPackage(format!("invalid domain {domain:?}")))
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let valid = path.starts_with('/')
        && path[1..].split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_graphic() && b != b'?' && b != b'#')
        });
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidPackage(format!("invalid path {path:?}")))
    }
}
