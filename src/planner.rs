//! Build planning
//!
//! This module provides:
//! - Workflow coordination: diff → resolve → expand
//! - Parallel change detection across packages
//! - Resolution that leaves dependencies on packages built in the same run symbolic

use crate::diff::ChangeDetector;
use crate::domain::{ChangeDecision, DependencyMap, ProjectManifest};
use crate::error::AppError;
use crate::expand::{apply_dependency_map, TransitiveExpander};
use crate::progress::Progress;
use crate::registry::{LookupCache, RegistryClient};
use crate::resolver::{DependencyVersionResolver, ResolveOptions};
use crate::vcs::VcsAdapter;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Change decision for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDecision {
    pub package: String,
    #[serde(flatten)]
    pub decision: ChangeDecision,
}

/// Result of a planning pass
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Manifest with resolved and expanded dependencies
    pub manifest: ProjectManifest,
    /// Expanded dependency closure per package, including external entries
    pub dependencies: DependencyMap,
    /// Decisions in manifest order
    pub decisions: Vec<PackageDecision>,
}

impl BuildPlan {
    /// Names of the packages that need a rebuild, in manifest order
    pub fn packages_to_build(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter(|d| d.decision.is_to_be_built)
            .map(|d| d.package.as_str())
            .collect()
    }
}

/// Planner combining change detection, resolution and expansion
pub struct BuildPlanner {
    registry: Arc<dyn RegistryClient>,
    vcs: Arc<dyn VcsAdapter>,
    detector: ChangeDetector,
    options: ResolveOptions,
    cache: Arc<LookupCache>,
}

impl BuildPlanner {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        vcs: Arc<dyn VcsAdapter>,
        detector: ChangeDetector,
        options: ResolveOptions,
    ) -> Self {
        Self {
            registry,
            vcs,
            detector,
            options,
            cache: Arc::new(LookupCache::new()),
        }
    }

    /// Plan a build without progress display
    pub async fn plan(&self, manifest: &ProjectManifest) -> Result<BuildPlan, AppError> {
        self.plan_with_progress(manifest, false).await
    }

    /// Resolution options for one run
    ///
    /// Packages rebuilt in this run join the skip set and leave the resolve
    /// scope, so their own dependency lists are kept as declared.
    fn options_for_run(&self, decisions: &[PackageDecision]) -> Result<ResolveOptions, AppError> {
        self.options.validate()?;

        let rebuilt: BTreeSet<String> = decisions
            .iter()
            .filter(|d| d.decision.is_to_be_built)
            .map(|d| d.package.clone())
            .collect();
        let skip = self.options.packages_to_skip.union(&rebuilt).cloned();
        let mut options = self.options.clone().with_packages_to_skip(skip);
        if let Some(to_resolve) = options.packages_to_resolve.as_mut() {
            to_resolve.retain(|package| {
                let keep = !rebuilt.contains(package);
                if !keep {
                    debug!(package = %package, "rebuilt in this run, not resolving its dependencies");
                }
                keep
            });
        }
        Ok(options)
    }

    /// Plan a build with optional progress display
    ///
    /// The first detection or resolution error aborts the plan. A package both
    /// in the resolve scope and rebuilt in this run keeps its declared
    /// dependencies; overlapping resolve and skip sets given by the caller
    /// still fail with `AmbiguousConfiguration`.
    pub async fn plan_with_progress(
        &self,
        manifest: &ProjectManifest,
        show_progress: bool,
    ) -> Result<BuildPlan, AppError> {
        let mut progress = Progress::new(show_progress);

        // Step 1: Decide which packages changed
        progress.spinner("Detecting changed packages...");
        let packages = manifest.package_names();
        let results = self.detector.detect_all(manifest, &packages).await;
        progress.finish_and_clear();

        let mut decisions = Vec::with_capacity(results.len());
        for (package, result) in results {
            decisions.push(PackageDecision {
                package,
                decision: result?,
            });
        }

        // Step 2: Resolve dependency versions, leaving packages built in this run symbolic
        progress.spinner("Resolving dependency versions...");
        let options = self.options_for_run(&decisions)?;
        let resolver = DependencyVersionResolver::with_cache(
            Arc::clone(&self.registry),
            Arc::clone(&self.vcs),
            options,
            Arc::clone(&self.cache),
        );
        let resolved = resolver.resolve(manifest).await;
        progress.finish_and_clear();
        let resolved = resolved?;

        // Step 3: Expand to transitive closures
        let dependencies =
            TransitiveExpander::new().expand(DependencyMap::from_manifest(&resolved))?;
        let manifest = apply_dependency_map(&resolved, &dependencies);

        let plan = BuildPlan {
            manifest,
            dependencies,
            decisions,
        };
        info!(
            packages = plan.decisions.len(),
            to_build = plan.packages_to_build().len(),
            "build plan ready"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffOptions;
    use crate::domain::{ChangeReason, DependencyRef, PackageDescriptor};
    use crate::error::VcsError;
    use crate::ignore_filter::IgnoreFilter;
    use crate::registry::InMemoryRegistry;
    use crate::vcs::parse_tag;

    struct Repo {
        tags: Vec<&'static str>,
        changed: Vec<&'static str>,
    }

    impl VcsAdapter for Repo {
        fn tags_matching(&self, package: &str) -> Result<Vec<String>, VcsError> {
            Ok(self
                .tags
                .iter()
                .filter(|t| parse_tag(t).is_some_and(|(p, _)| p == package))
                .map(|t| t.to_string())
                .collect())
        }
        fn diff(&self, _: &str, _: &str) -> Result<Vec<String>, VcsError> {
            Ok(self.changed.iter().map(|p| p.to_string()).collect())
        }
        fn commit_log(&self, _: &str) -> Result<Vec<String>, VcsError> {
            Ok(Vec::new())
        }
        fn show(&self, _: &str, _: &str) -> Result<String, VcsError> {
            Ok(String::new())
        }
    }

    fn manifest() -> ProjectManifest {
        ProjectManifest::new(vec![
            PackageDescriptor::new("base", "packages/base").with_version("1.0.0.NEXT"),
            PackageDescriptor::new("temp", "packages/temp")
                .with_version("1.0.0.NEXT")
                .with_dependencies(vec![DependencyRef::new("base", "1.0.0.LATEST")]),
            PackageDescriptor::new("core", "packages/core")
                .with_version("1.0.0.NEXT")
                .with_dependencies(vec![DependencyRef::new("temp", "1.0.0.LATEST")]),
            PackageDescriptor::new("candidate-management", "packages/candidate-management")
                .with_version("1.0.0.NEXT")
                .with_dependencies(vec![DependencyRef::new("core", "1.0.0.LATEST")]),
        ])
        .with_alias("base", "0Ho000000000001AAA")
        .with_alias("temp", "0Ho000000000002AAA")
        .with_alias("core", "0Ho000000000003AAA")
    }

    fn planner(repo: Repo) -> BuildPlanner {
        planner_with(repo, ResolveOptions::new())
    }

    fn planner_with(repo: Repo, options: ResolveOptions) -> BuildPlanner {
        let registry = InMemoryRegistry::new()
            .with_version("0Ho000000000001AAA", "1.0.0.4")
            .with_version("0Ho000000000002AAA", "1.0.0.2")
            .with_version("0Ho000000000003AAA", "1.0.0.9");
        let vcs: Arc<dyn VcsAdapter> = Arc::new(repo);
        let detector =
            ChangeDetector::new(Arc::clone(&vcs), IgnoreFilter::empty(), DiffOptions::new());
        BuildPlanner::new(Arc::new(registry), vcs, detector, options)
    }

    #[tokio::test]
    async fn test_plan_resolves_expands_and_decides() {
        let repo = Repo {
            tags: vec!["base_v1.0.0.4", "temp_v1.0.0.2", "core_v1.0.0.9"],
            changed: vec!["packages/candidate-management/main/default/classes/A.cls"],
        };
        let plan = planner(repo).plan(&manifest()).await.unwrap();

        assert_eq!(plan.packages_to_build(), vec!["candidate-management"]);
        assert_eq!(
            plan.decisions[0].decision,
            ChangeDecision::no_changes("base_v1.0.0.4")
        );

        let deps = &plan
            .manifest
            .package("candidate-management")
            .unwrap()
            .dependencies;
        assert_eq!(
            deps,
            &vec![
                DependencyRef::new("base", "1.0.0.4"),
                DependencyRef::new("temp", "1.0.0.2"),
                DependencyRef::new("core", "1.0.0.9"),
            ]
        );
        assert_eq!(
            plan.dependencies.get("candidate-management").unwrap(),
            deps.as_slice()
        );
    }

    #[tokio::test]
    async fn test_packages_built_in_same_run_stay_symbolic() {
        let repo = Repo {
            tags: vec![
                "temp_v1.0.0.2",
                "core_v1.0.0.9",
                "candidate-management_v1.0.0.1",
            ],
            changed: vec![],
        };
        let plan = planner(repo).plan(&manifest()).await.unwrap();

        assert_eq!(plan.decisions[0].decision.reason, ChangeReason::NoPriorTag);
        assert_eq!(plan.packages_to_build(), vec!["base"]);

        let temp = &plan.manifest.package("temp").unwrap().dependencies;
        assert_eq!(temp, &vec![DependencyRef::new("base", "1.0.0.LATEST")]);
        let core = &plan.manifest.package("core").unwrap().dependencies;
        assert_eq!(
            core,
            &vec![
                DependencyRef::new("base", "1.0.0.LATEST"),
                DependencyRef::new("temp", "1.0.0.2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_rebuilt_package_leaves_resolve_scope() {
        let repo = Repo {
            tags: vec!["base_v1.0.0.4", "temp_v1.0.0.2", "core_v1.0.0.9"],
            changed: vec!["packages/candidate-management/main/default/classes/A.cls"],
        };
        let options =
            ResolveOptions::new().with_packages_to_resolve(["core", "candidate-management"]);
        let plan = planner_with(repo, options).plan(&manifest()).await.unwrap();

        assert_eq!(plan.packages_to_build(), vec!["candidate-management"]);
        let core = &plan.manifest.package("core").unwrap().dependencies;
        assert_eq!(core.last(), Some(&DependencyRef::new("temp", "1.0.0.2")));
        let candidate = &plan
            .manifest
            .package("candidate-management")
            .unwrap()
            .dependencies;
        assert_eq!(candidate.last(), Some(&DependencyRef::new("core", "1.0.0.LATEST")));
    }

    #[tokio::test]
    async fn test_caller_overlap_is_still_ambiguous() {
        let repo = Repo {
            tags: vec![],
            changed: vec![],
        };
        let options = ResolveOptions::new()
            .with_packages_to_resolve(["core"])
            .with_packages_to_skip(["core"]);
        let err = planner_with(repo, options)
            .plan(&manifest())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AmbiguousConfiguration(_)));
    }

    #[test]
    fn test_plan_serializes_decisions_flat() {
        let plan = BuildPlan {
            manifest: ProjectManifest::new(vec![]),
            dependencies: DependencyMap::new(),
            decisions: vec![PackageDecision {
                package: "core".into(),
                decision: ChangeDecision::found_change("core_v1.0.0.1"),
            }],
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["decisions"][0]["package"], "core");
        assert_eq!(json["decisions"][0]["isToBeBuilt"], true);
        assert_eq!(json["decisions"][0]["reason"], "found_change");
        assert_eq!(json["decisions"][0]["tag"], "core_v1.0.0.1");
    }
}
