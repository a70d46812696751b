//! Tooling API registry adapter
//!
//! Queries `Package2Version` records through the platform's Tooling API query
//! endpoint: `{instance}/services/data/v{api}/tooling/query?q={soql}`.
//! Large result sets are paged through `nextRecordsUrl`.

use super::{HttpClient, RegistryClient, VersionRecord};
use crate::domain::{BuildSegment, VersionNumber};
use crate::error::RegistryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

/// Default API version
pub const DEFAULT_API_VERSION: &str = "60.0";

const REGISTRY_NAME: &str = "Tooling API";

/// Registry backed by the packaging platform's Tooling API
pub struct ToolingApiRegistry {
    client: HttpClient,
    instance_url: String,
    api_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    records: Vec<Package2VersionRecord>,
    #[serde(default)]
    next_records_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Package2VersionRecord {
    subscriber_package_version_id: Option<String>,
    package2_id: String,
    major_version: u64,
    minor_version: u64,
    patch_version: u64,
    build_number: u64,
    #[serde(default)]
    validation_skipped: bool,
    #[serde(default)]
    created_date: Option<String>,
}

impl From<Package2VersionRecord> for VersionRecord {
    fn from(record: Package2VersionRecord) -> Self {
        VersionRecord {
            package_identity: record.package2_id,
            version: format!(
                "{}.{}.{}.{}",
                record.major_version,
                record.minor_version,
                record.patch_version,
                record.build_number
            ),
            subscriber_version_id: record.subscriber_package_version_id,
            validated: !record.validation_skipped,
            created_at: record.created_date.as_deref().and_then(parse_created_date),
        }
    }
}

/// Parse timestamps such as `2024-01-15T10:00:00.000+0000`
fn parse_created_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl ToolingApiRegistry {
    /// Create a new Tooling API registry
    pub fn new(
        client: HttpClient,
        instance_url: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
        }
    }

    /// Build the SOQL query for a package identity and constraint
    fn build_query(
        package_identity: &str,
        version_constraint: &str,
        validated_only: bool,
    ) -> Result<String, RegistryError> {
        if package_identity.is_empty()
            || !package_identity.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(RegistryError::invalid_response(
                package_identity,
                REGISTRY_NAME,
                "package identity must be an alphanumeric record id",
            ));
        }
        let version = VersionNumber::parse(version_constraint).map_err(|e| {
            RegistryError::invalid_response(package_identity, REGISTRY_NAME, e.to_string())
        })?;

        let mut query = format!(
            "SELECT SubscriberPackageVersionId, Package2Id, MajorVersion, MinorVersion, \
             PatchVersion, BuildNumber, ValidationSkipped, CreatedDate \
             FROM Package2Version \
             WHERE Package2Id = '{}' AND IsDeprecated = false \
             AND MajorVersion = {} AND MinorVersion = {} AND PatchVersion = {}",
            package_identity, version.major, version.minor, version.patch
        );
        if let Some(BuildSegment::Number(build)) = version.build {
            query.push_str(&format!(" AND BuildNumber = {}", build));
        }
        if validated_only {
            query.push_str(" AND ValidationSkipped = false");
        }
        query.push_str(
            " ORDER BY MajorVersion DESC, MinorVersion DESC, PatchVersion DESC, BuildNumber DESC",
        );
        Ok(query)
    }

    /// Build the query URL
    fn build_url(&self, query: &str) -> Result<Url, RegistryError> {
        let base = format!(
            "{}/services/data/v{}/tooling/query",
            self.instance_url, self.api_version
        );
        Url::parse_with_params(&base, &[("q", query)]).map_err(|e| {
            RegistryError::network_error("", REGISTRY_NAME, format!("invalid instance URL: {}", e))
        })
    }
}

#[async_trait]
impl RegistryClient for ToolingApiRegistry {
    fn registry_name(&self) -> &'static str {
        REGISTRY_NAME
    }

    async fn lookup(
        &self,
        package_identity: &str,
        version_constraint: &str,
        validated_only: bool,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        let query = Self::build_query(package_identity, version_constraint, validated_only)?;
        let mut url = self.build_url(&query)?.to_string();
        let mut versions = Vec::new();

        loop {
            let response: QueryResponse = self
                .client
                .get_json(&url, package_identity, REGISTRY_NAME)
                .await?;
            versions.extend(response.records.into_iter().map(VersionRecord::from));

            match response.next_records_url {
                Some(next) => url = format!("{}{}", self.instance_url, next),
                None => break,
            }
        }

        debug!(
            package_identity,
            version_constraint,
            count = versions.len(),
            "fetched package versions"
        );
        Ok(versions)
    }
}
