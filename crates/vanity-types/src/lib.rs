//! Common types for vanity.
//!
//! These describe what the package registry hands to the HTTP layer: the
//! import prefix a package answers for, which VCS it uses, where the upstream
//! repository lives, and an optional branch or tag that `HEAD` is pinned to.

mod package;
mod pin;

pub use package::{PackageResolution, Vcs};
pub use pin::{PinError, PinnedRef, RefKind};
