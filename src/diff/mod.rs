//! Package change detection
//!
//! Decides whether a package must be rebuilt by diffing its baseline (the
//! newest release tag on the current branch, or an explicit commit) against
//! HEAD.

use crate::domain::{ChangeDecision, PackageDescriptor, PackageType, ProjectManifest};
use crate::error::{AppError, NotFoundError, VcsError};
use crate::ignore_filter::{normalize, IgnoreFilter};
use crate::vcs::{latest_tag, VcsAdapter};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default manifest location relative to the repository root
pub const DEFAULT_MANIFEST_PATH: &str = "sfdx-project.json";

/// Where the reference revision for a package comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BaselineSource {
    /// Newest `<package>_v*` tag reachable from HEAD
    #[default]
    LatestTag,
    /// Last known commit per package; packages missing from the map have no baseline
    Commits(HashMap<String, String>),
}

/// Options for change detection
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub baseline: BaselineSource,
    /// Treat a changed manifest entry as no change
    pub ignore_descriptor_changes: bool,
    /// Manifest path relative to the repository root
    pub manifest_path: String,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            baseline: BaselineSource::LatestTag,
            ignore_descriptor_changes: false,
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
        }
    }
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(mut self, baseline: BaselineSource) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_ignore_descriptor_changes(mut self, ignore: bool) -> Self {
        self.ignore_descriptor_changes = ignore;
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }
}

/// Decides which packages changed since their baseline
#[derive(Clone)]
pub struct ChangeDetector {
    vcs: Arc<dyn VcsAdapter>,
    ignore: Arc<IgnoreFilter>,
    options: DiffOptions,
}

impl ChangeDetector {
    pub fn new(vcs: Arc<dyn VcsAdapter>, ignore: IgnoreFilter, options: DiffOptions) -> Self {
        Self {
            vcs,
            ignore: Arc::new(ignore),
            options,
        }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Decide whether `package` needs a rebuild
    ///
    /// A diff that cannot be computed is an error, never "no change".
    pub fn detect(
        &self,
        manifest: &ProjectManifest,
        package: &str,
    ) -> Result<ChangeDecision, AppError> {
        let descriptor = manifest
            .package(package)
            .ok_or_else(|| NotFoundError::PackageNotInManifest {
                package: package.to_string(),
            })?;

        let Some(baseline) = self.baseline(package)? else {
            info!(package, "no previous version found");
            return Ok(ChangeDecision::no_prior_tag());
        };

        let changed = self
            .vcs
            .diff(&baseline, "HEAD")
            .map_err(|e| VcsError::unreachable_tag(package, &baseline, e))?;
        debug!(package, baseline = %baseline, files = changed.len(), "computed diff");

        let relevant = if manifest.package_type(package) == Some(PackageType::Data) {
            changed.clone()
        } else {
            self.ignore.filter(changed.clone())
        };

        let decision = if relevant
            .iter()
            .any(|path| is_under(path, &descriptor.path))
        {
            ChangeDecision::found_change(baseline)
        } else if self.descriptor_changed(descriptor, &baseline, &changed)? {
            ChangeDecision::descriptor_changed(baseline)
        } else {
            ChangeDecision::no_changes(baseline)
        };

        info!(
            package,
            build = decision.is_to_be_built,
            reason = %decision.reason,
            "change decision"
        );
        Ok(decision)
    }

    /// Detect changes for several packages in parallel
    ///
    /// Results are returned in the order of `packages`, each with its own outcome.
    pub async fn detect_all(
        &self,
        manifest: &ProjectManifest,
        packages: &[String],
    ) -> Vec<(String, Result<ChangeDecision, AppError>)> {
        let manifest = Arc::new(manifest.clone());

        let handles = packages.iter().map(|package| {
            let detector = self.clone();
            let manifest = Arc::clone(&manifest);
            let package = package.clone();
            async move {
                let name = package.clone();
                let result =
                    tokio::task::spawn_blocking(move || detector.detect(&manifest, &package))
                        .await
                        .unwrap_or_else(|e| {
                            Err(VcsError::InvalidOutput {
                                command: format!("diff {}", name),
                                message: e.to_string(),
                            }
                            .into())
                        });
                (name, result)
            }
        });

        join_all(handles).await
    }

    fn baseline(&self, package: &str) -> Result<Option<String>, VcsError> {
        match &self.options.baseline {
            BaselineSource::LatestTag => latest_tag(self.vcs.as_ref(), package),
            BaselineSource::Commits(commits) => Ok(commits.get(package).cloned()),
        }
    }

    /// Compare the descriptor with its version at the baseline revision
    ///
    /// Only consulted when the manifest file itself appears in the diff.
    fn descriptor_changed(
        &self,
        current: &PackageDescriptor,
        baseline: &str,
        changed: &[String],
    ) -> Result<bool, AppError> {
        if self.options.ignore_descriptor_changes {
            return Ok(false);
        }
        let manifest_path = normalize(&self.options.manifest_path);
        if !changed.iter().any(|p| normalize(p) == manifest_path) {
            return Ok(false);
        }

        let content = self
            .vcs
            .show(baseline, &manifest_path)
            .map_err(|e| VcsError::unreachable_tag(&current.name, baseline, e))?;
        let origin = format!("{}:{}", baseline, manifest_path);
        let previous = ProjectManifest::from_json_at(&content, Some(&origin))?;

        Ok(previous.package(&current.name) != Some(current))
    }
}

/// Returns true if `path` lies inside the directory `dir`
fn is_under(path: &str, dir: &str) -> bool {
    let dir = normalize(dir);
    if dir.is_empty() {
        return true;
    }
    Path::new(&normalize(path)).starts_with(Path::new(&dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeReason, DependencyRef};
    use crate::vcs::parse_tag;

    #[derive(Default)]
    struct ScriptedVcs {
        tags: Vec<String>,
        changed: Option<Vec<String>>,
        manifests: HashMap<String, String>,
    }

    impl ScriptedVcs {
        fn with_tag(mut self, tag: &str) -> Self {
            self.tags.push(tag.to_string());
            self
        }

        fn with_changes(mut self, paths: &[&str]) -> Self {
            self.changed = Some(paths.iter().map(|p| p.to_string()).collect());
            self
        }

        fn with_manifest_at(mut self, rev: &str, manifest: &ProjectManifest) -> Self {
            self.manifests
                .insert(rev.to_string(), manifest.to_json_pretty().unwrap());
            self
        }
    }

    impl VcsAdapter for ScriptedVcs {
        fn tags_matching(&self, package: &str) -> Result<Vec<String>, VcsError> {
            Ok(self
                .tags
                .iter()
                .filter(|t| parse_tag(t).is_some_and(|(p, _)| p == package))
                .cloned()
                .collect())
        }

        fn diff(&self, from_ref: &str, to_ref: &str) -> Result<Vec<String>, VcsError> {
            self.changed.clone().ok_or_else(|| {
                VcsError::command_failed(
                    format!("git diff --name-only --no-renames {} {}", from_ref, to_ref),
                    Some(128),
                    format!("fatal: bad revision '{}'", from_ref),
                )
            })
        }

        fn commit_log(&self, _: &str) -> Result<Vec<String>, VcsError> {
            Ok(Vec::new())
        }

        fn show(&self, rev: &str, path: &str) -> Result<String, VcsError> {
            self.manifests.get(rev).cloned().ok_or_else(|| {
                VcsError::command_failed(
                    format!("git show {}:{}", rev, path),
                    Some(128),
                    "fatal: invalid object name",
                )
            })
        }
    }

    fn manifest() -> ProjectManifest {
        ProjectManifest::new(vec![
            PackageDescriptor::new("base", "packages/base").with_version("1.0.0.NEXT"),
            PackageDescriptor::new("core", "packages/core")
                .with_version("1.0.0.NEXT")
                .with_dependencies(vec![DependencyRef::new("base", "1.0.0.LATEST")]),
            PackageDescriptor::new("core-data", "packages/core-data")
                .with_type(PackageType::Data)
                .with_version("1.0.0.NEXT"),
        ])
        .with_alias("base", "0Ho000000000001AAA")
        .with_alias("core", "0Ho000000000002AAA")
    }

    fn detector(vcs: ScriptedVcs, ignore: &str, options: DiffOptions) -> ChangeDetector {
        ChangeDetector::new(
            Arc::new(vcs),
            IgnoreFilter::from_patterns(ignore).unwrap(),
            options,
        )
    }

    #[test]
    fn test_no_prior_tag() {
        let detector = detector(
            ScriptedVcs::default().with_tag("base_v1.0.0.1"),
            "",
            DiffOptions::new(),
        );
        let decision = detector.detect(&manifest(), "core").unwrap();
        assert!(decision.is_to_be_built);
        assert_eq!(decision.reason, ChangeReason::NoPriorTag);
        assert_eq!(decision.reason.message(), "Previous version not found");
        assert!(decision.tag.is_none());
    }

    #[test]
    fn test_found_change_under_package_path() {
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.1")
            .with_tag("core_v1.0.0.2")
            .with_changes(&["packages/core/main/default/classes/Account.cls"]);
        let decision = detector(vcs, "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert_eq!(decision, ChangeDecision::found_change("core_v1.0.0.2"));
        assert_eq!(decision.reason.message(), "Found change(s) in package");
    }

    #[test]
    fn test_change_outside_package_path() {
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_changes(&["config/project-scratch-def.json", "packages/core-ext/x.cls"]);
        let decision = detector(vcs, "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert!(!decision.is_to_be_built);
        assert_eq!(decision.reason.message(), "No changes found");
    }

    #[test]
    fn test_descriptor_changed() {
        let mut previous = manifest();
        previous.package_mut("core").unwrap().dependencies =
            vec![DependencyRef::new("base", "0.9.0.LATEST")];

        let vcs = || {
            ScriptedVcs::default()
                .with_tag("core_v1.0.0.2")
                .with_changes(&["sfdx-project.json"])
                .with_manifest_at("core_v1.0.0.2", &previous)
        };

        let decision = detector(vcs(), "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert_eq!(decision, ChangeDecision::descriptor_changed("core_v1.0.0.2"));
        assert_eq!(decision.reason.message(), "Package Descriptor Changed");

        let decision = detector(
            vcs(),
            "",
            DiffOptions::new().with_ignore_descriptor_changes(true),
        )
        .detect(&manifest(), "core")
        .unwrap();
        assert!(!decision.is_to_be_built);
        assert_eq!(decision.reason, ChangeReason::NoChanges);
    }

    #[test]
    fn test_manifest_change_for_other_package() {
        let mut previous = manifest();
        previous.package_mut("base").unwrap().version_number = Some("0.9.0.NEXT".into());

        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_changes(&["sfdx-project.json"])
            .with_manifest_at("core_v1.0.0.2", &previous);
        let decision = detector(vcs, "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert_eq!(decision, ChangeDecision::no_changes("core_v1.0.0.2"));
    }

    #[test]
    fn test_package_missing_from_previous_manifest() {
        let previous = ProjectManifest::new(vec![PackageDescriptor::new("base", "packages/base")]);
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_changes(&["sfdx-project.json"])
            .with_manifest_at("core_v1.0.0.2", &previous);
        let decision = detector(vcs, "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert_eq!(decision.reason, ChangeReason::DescriptorChanged);
    }

    #[test]
    fn test_ignored_files_do_not_count() {
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_changes(&["packages/core/README.md", "packages/core/jest.config.js"]);
        let decision = detector(vcs, "**/README.md\n**/jest.config.js", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap();
        assert_eq!(decision.reason, ChangeReason::NoChanges);
    }

    #[test]
    fn test_data_packages_bypass_ignore_rules() {
        let vcs = ScriptedVcs::default()
            .with_tag("core-data_v1.0.0.1")
            .with_changes(&["packages/core-data/accounts.csv"]);
        let decision = detector(vcs, "*.csv", DiffOptions::new())
            .detect(&manifest(), "core-data")
            .unwrap();
        assert_eq!(decision, ChangeDecision::found_change("core-data_v1.0.0.1"));
    }

    #[test]
    fn test_unreachable_tag_is_error() {
        let vcs = ScriptedVcs::default().with_tag("core_v1.0.0.2");
        let err = detector(vcs, "", DiffOptions::new())
            .detect(&manifest(), "core")
            .unwrap_err();
        match err {
            AppError::Vcs(VcsError::UnreachableTag { package, tag, .. }) => {
                assert_eq!(package, "core");
                assert_eq!(tag, "core_v1.0.0.2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_commit_baseline() {
        let commits = HashMap::from([("core".to_string(), "4f2a9c1".to_string())]);
        let options = DiffOptions::new().with_baseline(BaselineSource::Commits(commits));
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_tag("base_v1.0.0.1")
            .with_changes(&["packages/core/lwc/a.js"]);
        let detector = detector(vcs, "", options);

        let decision = detector.detect(&manifest(), "core").unwrap();
        assert_eq!(decision, ChangeDecision::found_change("4f2a9c1"));

        // Tags are not consulted in commit mode
        let decision = detector.detect(&manifest(), "base").unwrap();
        assert_eq!(decision, ChangeDecision::no_prior_tag());
    }

    #[test]
    fn test_unknown_package() {
        let err = detector(ScriptedVcs::default(), "", DiffOptions::new())
            .detect(&manifest(), "ghost")
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound(NotFoundError::PackageNotInManifest { .. })
        ));
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("packages/core/a.cls", "packages/core"));
        assert!(is_under("./packages/core/a.cls", "packages/core/"));
        assert!(!is_under("packages/core-ext/a.cls", "packages/core"));
        assert!(!is_under("packages/cor", "packages/core"));
    }

    #[test]
    fn test_is_under_repository_root() {
        assert!(is_under("classes/A.cls", "."));
        assert!(is_under("classes/A.cls", "./"));
        assert!(is_under("sfdx-project.json", ""));
    }

    #[tokio::test]
    async fn test_detect_all_keeps_order_and_errors() {
        let vcs = ScriptedVcs::default()
            .with_tag("core_v1.0.0.2")
            .with_changes(&["packages/core/a.cls"]);
        let detector = detector(vcs, "", DiffOptions::new());
        let packages = vec!["base".to_string(), "core".to_string(), "ghost".to_string()];

        let results = detector.detect_all(&manifest(), &packages).await;
        let names: Vec<_> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["base", "core", "ghost"]);

        assert_eq!(
            results[0].1.as_ref().unwrap(),
            &ChangeDecision::no_prior_tag()
        );
        assert_eq!(
            results[1].1.as_ref().unwrap(),
            &ChangeDecision::found_change("core_v1.0.0.2")
        );
        assert!(results[2].1.is_err());
    }
}
