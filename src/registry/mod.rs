//! Version registry clients
//!
//! This module provides:
//! - The `RegistryClient` trait consumed by the dependency resolver
//! - A per-resolver lookup cache keyed by identity and constraint
//! - HTTP client shared foundation with retry logic
//! - Tooling API adapter for the packaging platform
//! - In-memory registry for offline runs

mod cache;
mod client;
mod memory;
mod tooling_api;

pub use cache::LookupCache;
pub use client::HttpClient;
pub use memory::InMemoryRegistry;
pub use tooling_api::{ToolingApiRegistry, DEFAULT_API_VERSION};

use crate::error::RegistryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A concrete published version known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// Stable registry identifier of the package
    pub package_identity: String,
    /// Four-segment version, e.g. `1.2.3.4`
    pub version: String,
    /// Immutable identifier of this published version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_version_id: Option<String>,
    /// Whether the version passed the registry's validation gate
    #[serde(default = "default_validated")]
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_validated() -> bool {
    true
}

impl VersionRecord {
    /// Creates a validated record
    pub fn new(package_identity: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package_identity: package_identity.into(),
            version: version.into(),
            subscriber_version_id: None,
            validated: true,
            created_at: None,
        }
    }

    pub fn with_subscriber_version_id(mut self, id: impl Into<String>) -> Self {
        self.subscriber_version_id = Some(id.into());
        self
    }

    pub fn with_validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }
}

/// Source of concrete package versions
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Get the registry name used in error messages
    fn registry_name(&self) -> &'static str;

    /// Versions of `package_identity` matching a 3- or 4-segment constraint, newest first
    ///
    /// An empty list means no matching version exists yet and is not an error.
    async fn lookup(
        &self,
        package_identity: &str,
        version_constraint: &str,
        validated_only: bool,
    ) -> Result<Vec<VersionRecord>, RegistryError>;
}
