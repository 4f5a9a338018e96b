//! Pinned git references.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of reference a package can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// A branch under `refs/heads/`.
    Branch,
    /// A tag under `refs/tags/`.
    Tag,
}

impl RefKind {
    /// Returns the lowercase name used in messages and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when building a [`PinnedRef`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// The ref name was empty.
    #[error("{0} pin requires a non-empty ref name")]
    EmptyName(RefKind),

    /// The ref name contains bytes that cannot appear in a pkt-line ref.
    #[error("invalid ref name: {0:?}")]
    InvalidName(String),
}

/// A branch or tag that a package's `HEAD` is pinned to.
///
/// A pin always has a name; an unpinned package carries no `PinnedRef` at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPin", into = "RawPin")]
pub struct PinnedRef {
    kind: RefKind,
    name: String,
}

impl PinnedRef {
    /// Creates a new pin, rejecting empty or unprintable names.
    pub fn new(kind: RefKind, name: impl Into<String>) -> Result<Self, PinError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PinError::EmptyName(kind));
        }
        if name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b' ' || b == b'\0')
        {
            return Err(PinError::InvalidName(name));
        }
        Ok(Self { kind, name })
    }

    /// Pins to a branch.
    pub fn branch(name: impl Into<String>) -> Result<Self, PinError> {
        Self::new(RefKind::Branch, name)
    }

    /// Pins to a tag.
    pub fn tag(name: impl Into<String>) -> Result<Self, PinError> {
        Self::new(RefKind::Tag, name)
    }

    /// Returns the ref kind.
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Returns the short ref name (without `refs/heads/` or `refs/tags/`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified ref name.
    pub fn full_name(&self) -> String {
        match self.kind {
            RefKind::Branch => format!("refs/heads/{}", self.name),
            RefKind::Tag => format!("refs/tags/{}", self.name),
        }
    }
}

impl fmt::Display for PinnedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[derive(Serialize, Deserialize)]
struct RawPin {
    kind: RefKind,
    name: String,
}

impl TryFrom<RawPin> for PinnedRef {
    type Error = PinError;

    fn try_from(raw: RawPin) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.name)
    }
}

impl From<PinnedRef> for RawPin {
    fn from(pin: PinnedRef) -> Self {
        Self {
            kind: pin.kind,
            name: pin.name,
        }
    }
}
