//! Registry lookup cache
//!
//! Results are keyed by package identity, version constraint and the validated
//! filter. Concurrent requests for the same key share a single registry call.

use super::{RegistryClient, VersionRecord};
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    package_identity: String,
    version_constraint: String,
    validated_only: bool,
}

/// Memoised registry lookups for the lifetime of the owner
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<Vec<VersionRecord>>>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result or query the registry once for this key
    ///
    /// Failed lookups are not cached.
    pub async fn get_or_lookup(
        &self,
        registry: &dyn RegistryClient,
        package_identity: &str,
        version_constraint: &str,
        validated_only: bool,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        let key = CacheKey {
            package_identity: package_identity.to_string(),
            version_constraint: version_constraint.to_string(),
            validated_only,
        };

        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key).or_default().clone()
        };

        if let Some(records) = cell.get() {
            debug!(package_identity, version_constraint, "registry cache hit");
            return Ok(records.clone());
        }

        let records = cell
            .get_or_try_init(|| {
                registry.lookup(package_identity, version_constraint, validated_only)
            })
            .await?;
        Ok(records.clone())
    }

    /// Number of keys with a completed lookup
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
