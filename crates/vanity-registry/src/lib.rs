//! Package registry for vanity.
//!
//! The HTTP layer only ever asks one question: what does `<fqdn><path>`
//! resolve to? [`PackageRegistry`] is that seam. [`MemoryRegistry`] answers it
//! from packages registered at startup.

mod entry;
mod error;
mod memory;

pub use entry::PackageEntry;
pub use error::{RegistryError, Result};
pub use memory::MemoryRegistry;

use async_trait::async_trait;
use vanity_types::PackageResolution;

/// Resolves import paths to packages.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Resolves `<fqdn><path>` to the longest matching registered package.
    ///
    /// Returns [`RegistryError::DomainNotFound`] when nothing is registered for
    /// the domain and [`RegistryError::PackageNotFound`] when the domain is
    /// known but no package path matches.
    async fn resolve_package(&self, path: &str) -> Result<PackageResolution>;
}
