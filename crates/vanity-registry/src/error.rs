//! Registry error types.

use thiserror::Error;

/// Errors that can occur while registering or resolving packages.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No packages are registered for the domain.
    #[error("domain not found: {0}")]
    DomainNotFound(String),

    /// The domain is known but no package matches the path.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// A package entry failed validation.
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// A package with the same domain and path already exists.
    #[error("package already exists: {0}")]
    PackageExists(String),

    /// The backing store failed.
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl RegistryError {
    /// Returns true for either not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DomainNotFound(_) | Self::PackageNotFound(_))
    }
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
