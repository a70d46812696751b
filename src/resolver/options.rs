//! Resolver options

use crate::error::AmbiguousConfigurationError;
use std::collections::BTreeSet;

/// Default concurrency limit for registry requests
pub const DEFAULT_CONCURRENCY: usize = 10;

/// What a resolution pass is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Resolve every symbolic dependency ahead of a build
    #[default]
    Build,
    /// Only resolve dependencies published outside this repository
    ExternalOnly,
}

/// Options controlling one resolution pass
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub mode: ResolutionMode,
    /// Packages whose dependency lists are rewritten; `None` means all
    pub packages_to_resolve: Option<BTreeSet<String>>,
    /// Packages built in the same run; dependencies on them are left symbolic
    pub packages_to_skip: BTreeSet<String>,
    /// Only consider versions that passed registry validation
    pub validated_only: bool,
    /// Maximum concurrent registry lookups
    pub concurrency: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::default(),
            packages_to_resolve: None,
            packages_to_skip: BTreeSet::new(),
            validated_only: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_packages_to_resolve<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages_to_resolve = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_packages_to_skip<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages_to_skip = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validated_only(mut self, validated_only: bool) -> Self {
        self.validated_only = validated_only;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reject packages that are both resolved and skipped
    pub fn validate(&self) -> Result<(), AmbiguousConfigurationError> {
        let Some(to_resolve) = &self.packages_to_resolve else {
            return Ok(());
        };
        let overlap: Vec<String> = to_resolve
            .intersection(&self.packages_to_skip)
            .cloned()
            .collect();
        if overlap.is_empty() {
            Ok(())
        } else {
            Err(AmbiguousConfigurationError { packages: overlap })
        }
    }

    /// Check if a package's dependency list should be rewritten
    pub fn should_resolve(&self, package: &str) -> bool {
        self.packages_to_resolve
            .as_ref()
            .is_none_or(|set| set.contains(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ResolveOptions::new();
        assert_eq!(options.mode, ResolutionMode::Build);
        assert!(options.packages_to_resolve.is_none());
        assert!(options.packages_to_skip.is_empty());
        assert!(options.validated_only);
        assert_eq!(options.concurrency, 10);
    }

    #[test]
    fn test_should_resolve() {
        assert!(ResolveOptions::new().should_resolve("core"));

        let options = ResolveOptions::new().with_packages_to_resolve(["core"]);
        assert!(options.should_resolve("core"));
        assert!(!options.should_resolve("temp"));
    }

    #[test]
    fn test_validate_overlap() {
        let options = ResolveOptions::new()
            .with_packages_to_resolve(["core", "temp"])
            .with_packages_to_skip(["temp", "base"]);
        let err = options.validate().unwrap_err();
        assert_eq!(err.packages, vec!["temp"]);
    }

    #[test]
    fn test_validate_disjoint() {
        let options = ResolveOptions::new()
            .with_packages_to_resolve(["core"])
            .with_packages_to_skip(["base"]);
        assert!(options.validate().is_ok());
        assert!(ResolveOptions::new().with_packages_to_skip(["base"]).validate().is_ok());
    }

    #[test]
    fn test_concurrency_floor() {
        assert_eq!(ResolveOptions::new().with_concurrency(0).concurrency, 1);
    }
}
