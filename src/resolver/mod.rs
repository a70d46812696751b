//! Dependency version resolution
//!
//! Rewrites symbolic dependency versions (`1.2.3.LATEST`) into concrete ones
//! using the version registry. Dependencies on packages built from this
//! repository must additionally be traceable to a release tag on the current
//! branch.

mod options;

pub use options::{ResolutionMode, ResolveOptions, DEFAULT_CONCURRENCY};

use crate::domain::{DependencyRef, PackageDescriptor, ProjectManifest, VersionNumber};
use crate::error::{AppError, NotFoundError, RegistryError, ValidationError, VcsError};
use crate::registry::{LookupCache, RegistryClient, VersionRecord};
use crate::vcs::{tag_matches_version, VcsAdapter};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of resolving one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// Left as declared
    Unchanged,
    /// Pinned to a concrete version
    Resolved(String),
    /// Unknown to the registry; dropped from the list
    Removed,
}

/// Resolves symbolic dependency versions against the registry
pub struct DependencyVersionResolver {
    registry: Arc<dyn RegistryClient>,
    vcs: Arc<dyn VcsAdapter>,
    cache: Arc<LookupCache>,
    branch_tags: Mutex<HashMap<String, Arc<Vec<String>>>>,
    lookup_permits: Semaphore,
    options: ResolveOptions,
}

impl DependencyVersionResolver {
    /// Create a resolver with its own lookup cache
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        vcs: Arc<dyn VcsAdapter>,
        options: ResolveOptions,
    ) -> Self {
        Self::with_cache(registry, vcs, options, Arc::new(LookupCache::new()))
    }

    /// Create a resolver sharing a lookup cache with other passes
    pub fn with_cache(
        registry: Arc<dyn RegistryClient>,
        vcs: Arc<dyn VcsAdapter>,
        options: ResolveOptions,
        cache: Arc<LookupCache>,
    ) -> Self {
        Self {
            registry,
            vcs,
            cache,
            branch_tags: Mutex::new(HashMap::new()),
            lookup_permits: Semaphore::new(options.concurrency.max(1)),
            options,
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    /// Resolve every in-scope package and return an updated copy of the manifest
    ///
    /// The input manifest is never modified. Any failure aborts the whole pass.
    pub async fn resolve(&self, manifest: &ProjectManifest) -> Result<ProjectManifest, AppError> {
        self.options.validate()?;
        if let Some(requested) = &self.options.packages_to_resolve {
            if let Some(missing) = requested.iter().find(|p| !manifest.is_monorepo_package(p)) {
                return Err(NotFoundError::PackageNotInManifest {
                    package: missing.clone(),
                }
                .into());
            }
        }

        let targets: Vec<&PackageDescriptor> = manifest
            .packages()
            .filter(|p| self.options.should_resolve(&p.name))
            .collect();

        let resolved = try_join_all(
            targets
                .iter()
                .map(|package| self.resolve_package(manifest, package)),
        )
        .await?;

        let mut output = manifest.clone();
        for (name, dependencies) in resolved {
            if let Some(descriptor) = output.package_mut(&name) {
                descriptor.dependencies = dependencies;
            }
        }
        Ok(output)
    }

    async fn resolve_package(
        &self,
        manifest: &ProjectManifest,
        package: &PackageDescriptor,
    ) -> Result<(String, Vec<DependencyRef>), AppError> {
        let mut dependencies = Vec::with_capacity(package.dependencies.len());

        for dependency in &package.dependencies {
            match self
                .resolve_dependency(manifest, &package.name, dependency)
                .await?
            {
                Resolution::Unchanged => dependencies.push(dependency.clone()),
                Resolution::Resolved(version) => {
                    debug!(
                        package = %package.name,
                        dependency = %dependency,
                        resolved = %version,
                        "resolved dependency"
                    );
                    dependencies.push(DependencyRef::new(dependency.package.clone(), version));
                }
                Resolution::Removed => {}
            }
        }

        info!(
            package = %package.name,
            dependencies = dependencies.len(),
            "resolved package dependencies"
        );
        Ok((package.name.clone(), dependencies))
    }

    async fn resolve_dependency(
        &self,
        manifest: &ProjectManifest,
        package: &str,
        dependency: &DependencyRef,
    ) -> Result<Resolution, AppError> {
        if manifest.is_pinned_to_opaque_id(dependency) {
            return Ok(Resolution::Unchanged);
        }
        if self.options.packages_to_skip.contains(&dependency.package) {
            debug!(package, dependency = %dependency.package, "built in this run, skipping");
            return Ok(Resolution::Unchanged);
        }

        let is_internal = manifest.is_monorepo_package(&dependency.package);
        if self.options.mode == ResolutionMode::ExternalOnly && is_internal {
            return Ok(Resolution::Unchanged);
        }

        let declared = dependency.version_number.as_deref().ok_or_else(|| {
            ValidationError::invalid_dependency(
                package,
                &dependency.package,
                "versionNumber is required unless the package alias is a version id",
            )
        })?;
        let version = VersionNumber::parse(declared).map_err(|e| {
            ValidationError::invalid_dependency(package, &dependency.package, e.to_string())
        })?;
        if version.is_concrete() {
            return Ok(Resolution::Unchanged);
        }

        let identity = manifest
            .alias_identity(&dependency.package)
            .ok_or_else(|| NotFoundError::AliasNotFound {
                package: package.to_string(),
                dependency: dependency.package.clone(),
            })?;
        let constraint = version.without_symbolic_build().to_string();

        let records = match self.lookup(identity, &constraint).await {
            Ok(records) => records,
            Err(RegistryError::PackageNotFound { .. }) => {
                warn!(
                    package,
                    dependency = %dependency.package,
                    identity,
                    "dependency is not known to the registry, removing it"
                );
                return Ok(Resolution::Removed);
            }
            Err(e) => return Err(e.into()),
        };

        if records.is_empty() {
            return Err(NotFoundError::NoMatchingVersion {
                package: package.to_string(),
                dependency: dependency.package.clone(),
                version: declared.to_string(),
            }
            .into());
        }

        let chosen = if is_internal {
            self.select_on_branch(package, &dependency.package, declared, &records)
                .await?
        } else {
            records[0].version.clone()
        };
        Ok(Resolution::Resolved(chosen))
    }

    async fn lookup(
        &self,
        identity: &str,
        constraint: &str,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        // The semaphore is never closed
        let _permit = self.lookup_permits.acquire().await.ok();
        self.cache
            .get_or_lookup(
                self.registry.as_ref(),
                identity,
                constraint,
                self.options.validated_only,
            )
            .await
    }

    /// First candidate, in registry order, whose version is tagged on the current branch
    async fn select_on_branch(
        &self,
        package: &str,
        dependency: &str,
        declared: &str,
        records: &[VersionRecord],
    ) -> Result<String, AppError> {
        let tags = self.branch_tags(dependency).await?;

        records
            .iter()
            .find(|record| tags.iter().any(|tag| tag_matches_version(tag, &record.version)))
            .map(|record| record.version.clone())
            .ok_or_else(|| {
                NotFoundError::NoBranchTag {
                    package: package.to_string(),
                    dependency: dependency.to_string(),
                    version: declared.to_string(),
                    candidates: records.iter().map(|r| r.version.clone()).collect(),
                }
                .into()
            })
    }

    async fn branch_tags(&self, package: &str) -> Result<Arc<Vec<String>>, VcsError> {
        if let Some(tags) = self.cached_tags(package) {
            return Ok(tags);
        }

        let vcs = Arc::clone(&self.vcs);
        let name = package.to_string();
        let tags = tokio::task::spawn_blocking(move || vcs.tags_matching(&name))
            .await
            .map_err(|e| VcsError::InvalidOutput {
                command: format!("list tags for {}", package),
                message: e.to_string(),
            })??;

        let tags = Arc::new(tags);
        self.branch_tags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(package.to_string(), Arc::clone(&tags));
        Ok(tags)
    }

    fn cached_tags(&self, package: &str) -> Option<Arc<Vec<String>>> {
        self.branch_tags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(package)
            .cloned()
    }
}
