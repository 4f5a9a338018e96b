//! In-memory package registry.

use crate::{PackageEntry, PackageRegistry, RegistryError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use vanity_types::PackageResolution;

/// Thread-safe in-memory registry keyed by domain.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    domains: RwLock<HashMap<String, Vec<PackageEntry>>>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `entries`.
    pub fn from_entries(entries: impl IntoIterator<Item = PackageEntry>) -> Result<Self> {
        let registry = Self::new();
        for entry in entries {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Registers a package.
    pub fn register(&self, entry: PackageEntry) -> Result<()> {
        let entry = entry.normalized()?;
        let mut domains = self.domains.write();
        let packages = domains.entry(entry.domain.clone()).or_default();

        if packages.iter().any(|p| p.path == entry.path) {
            return Err(RegistryError::PackageExists(entry.import_prefix()));
        }

        tracing::debug!(
            package = %entry.import_prefix(),
            vcs = %entry.vcs,
            repo_root = %entry.repo_root,
            "Package registered"
        );
        packages.push(entry);
        Ok(())
    }

    /// Number of registered packages.
    pub fn len(&self) -> usize {
        self.domains.read().values().map(Vec::len).sum()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }

    fn lookup(&self, key: &str) -> Result<PackageResolution> {
        let (domain, path) = match key.find('/') {
            Some(idx) => key.split_at(idx),
            None => (key, ""),
        };
        let domain = domain.to_ascii_lowercase();

        let domains = self.domains.read();
        let packages = domains
            .get(&domain)
            .ok_or_else(|| RegistryError::DomainNotFound(domain.clone()))?;

        packages
            .iter()
            .filter(|p| p.matches(path))
            .max_by_key(|p| p.path.len())
            .map(PackageEntry::to_resolution)
            .ok_or_else(|| RegistryError::PackageNotFound(key.to_string()))
    }
}

#[async_trait]
impl PackageRegistry for MemoryRegistry {
    async fn resolve_package(&self, path: &str) -> Result<PackageResolution> {
        self.lookup(path)
    }
}
