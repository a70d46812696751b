//! In-memory registry
//!
//! Holds version records per package identity. Loaded from a JSON file of the
//! form `{ "<identity>": [ { "version": "1.0.0.1", "validated": true } ] }` for
//! offline runs.

use super::{RegistryClient, VersionRecord};
use crate::domain::VersionNumber;
use crate::error::{ManifestError, RegistryError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const REGISTRY_NAME: &str = "in-memory";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    version: String,
    #[serde(default)]
    subscriber_version_id: Option<String>,
    #[serde(default = "default_validated")]
    validated: bool,
}

fn default_validated() -> bool {
    true
}

/// Registry holding its records in memory
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    packages: HashMap<String, Vec<VersionRecord>>,
    lookups: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version record
    pub fn with_record(mut self, record: VersionRecord) -> Self {
        self.packages
            .entry(record.package_identity.clone())
            .or_default()
            .push(record);
        self
    }

    /// Register a validated version
    pub fn with_version(self, package_identity: &str, version: &str) -> Self {
        self.with_record(VersionRecord::new(package_identity, version))
    }

    /// Parse registry JSON text
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let raw: HashMap<String, Vec<FileRecord>> = serde_json::from_str(content)
            .map_err(|e| ManifestError::parse_error(Some("registry file"), e.to_string()))?;

        let mut registry = Self::new();
        for (identity, records) in raw {
            for record in records {
                let mut version = VersionRecord::new(&identity, record.version)
                    .with_validated(record.validated);
                version.subscriber_version_id = record.subscriber_version_id;
                registry = registry.with_record(version);
            }
        }
        Ok(registry)
    }

    /// Load a registry JSON file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))?;
        Self::from_json(&content)
    }

    /// Number of lookups served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    fn registry_name(&self) -> &'static str {
        REGISTRY_NAME
    }

    async fn lookup(
        &self,
        package_identity: &str,
        version_constraint: &str,
        validated_only: bool,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let records = self
            .packages
            .get(package_identity)
            .ok_or_else(|| RegistryError::package_not_found(package_identity, REGISTRY_NAME))?;
        let constraint = VersionNumber::parse(version_constraint).map_err(|e| {
            RegistryError::invalid_response(package_identity, REGISTRY_NAME, e.to_string())
        })?;

        let mut matching: Vec<(VersionNumber, VersionRecord)> = records
            .iter()
            .filter(|r| r.validated || !validated_only)
            .filter_map(|r| VersionNumber::parse(&r.version).ok().map(|v| (v, r.clone())))
            .filter(|(v, _)| v.satisfies(&constraint))
            .collect();

        // Newest first
        matching.sort_by(|(a, _), (b, _)| b.cmp_precedence(a));
        Ok(matching.into_iter().map(|(_, r)| r).collect())
    }
}
