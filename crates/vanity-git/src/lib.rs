//! Git smart HTTP support for vanity.
//!
//! This crate parses the legacy (v0) `info/refs?service=git-upload-pack`
//! advertisement an upstream git server returns, and rewrites it so that
//! clients see a pinned branch or tag as `HEAD`.

mod advertisement;
mod error;
mod pktline;

pub use advertisement::{parse_advertisement, rewrite_advertisement, Frame, FrameKind, RefRecord};
pub use error::GitError;
pub use pktline::{PktLine, PktLineWriter, MAX_PKT_LEN};

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
