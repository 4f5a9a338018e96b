//! Package resolution records.

use crate::PinnedRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version control systems a package can be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    /// Git.
    #[default]
    Git,
    /// Mercurial.
    Hg,
    /// Bazaar.
    Bzr,
    /// Subversion.
    Svn,
}

impl Vcs {
    /// Returns the name `go get` expects in a `go-import` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Bzr => "bzr",
            Self::Svn => "svn",
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a `host + path` resolves to.
///
/// Produced by the package registry and read-only to everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageResolution {
    /// Canonical import path (`fqdn + path`).
    pub import_prefix: String,
    /// VCS of the upstream repository.
    pub vcs: Vcs,
    /// Absolute URL of the upstream repository.
    pub repo_root: String,
    /// Branch or tag that `HEAD` is pinned to, if any.
    pub pin: Option<PinnedRef>,
    /// Template for the `go-source` meta tag (may be empty).
    pub go_source: String,
    /// Where browsers are sent.
    pub redirect_url: Option<String>,
    /// A disabled package is treated as not found.
    pub disabled: bool,
}

impl PackageResolution {
    /// Creates an unpinned, enabled resolution.
    pub fn new(import_prefix: impl Into<String>, vcs: Vcs, repo_root: impl Into<String>) -> Self {
        Self {
            import_prefix: import_prefix.into(),
            vcs,
            repo_root: repo_root.into(),
            pin: None,
            go_source: String::new(),
            redirect_url: None,
            disabled: false,
        }
    }

    /// Sets the pinned ref.
    pub fn with_pin(mut self, pin: PinnedRef) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Returns true if `HEAD` is pinned to a branch or tag.
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }
}
