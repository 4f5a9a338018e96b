//! Git protocol error types.

use thiserror::Error;
use vanity_types::RefKind;

/// Errors that can occur while parsing or rewriting a ref advertisement.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pkt-line framing.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// The advertisement has no `HEAD`, or no ref matching the pin.
    #[error("ref not found: {kind} {name}")]
    RefNotFound {
        /// Kind of the pinned ref.
        kind: RefKind,
        /// Short name of the pinned ref.
        name: String,
    },

    /// I/O error while writing the rewritten stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Returns true if this error means the pinned ref is not advertised upstream.
    pub fn is_ref_not_found(&self) -> bool {
        matches!(self, Self::RefNotFound { .. })
    }
}
