//! Transitive dependency expansion
//!
//! Turns each package's direct dependency list into its transitive closure.
//! Dependencies contributed by a parent are placed ahead of the dependency
//! that introduced them, and when the same package is reached at several
//! versions only the newest survives, at the position of its first occurrence.

mod shrink;

pub use shrink::shrink_manifest;

use crate::domain::{compare_versions, DependencyMap, DependencyRef, ProjectManifest};
use crate::error::ValidationError;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Computes transitive dependency closures over a [`DependencyMap`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveExpander;

impl TransitiveExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand every package until no list changes
    ///
    /// Each pass reads the lists written earlier in the same pass, so the
    /// number of passes needed depends on the map's ordering. The loop is
    /// bounded by the number of packages plus one.
    pub fn expand(&self, mut map: DependencyMap) -> Result<DependencyMap, ValidationError> {
        let max_passes = map.len() + 1;
        for pass in 1..=max_passes {
            if !self.expand_single_pass(&mut map)? {
                debug!(passes = pass, "dependency expansion reached a fixed point");
                return Ok(map);
            }
        }
        warn!(
            passes = max_passes,
            "dependency expansion did not settle, returning last pass"
        );
        Ok(map)
    }

    /// Run one expansion pass over the map in insertion order
    ///
    /// Returns true if any package's list changed.
    pub fn expand_single_pass(&self, map: &mut DependencyMap) -> Result<bool, ValidationError> {
        let mut changed = false;

        for package in map.packages() {
            let Some(direct) = map.get(&package) else {
                continue;
            };

            let mut expanded = Vec::with_capacity(direct.len());
            for dependency in direct {
                if let Some(parents) = map.get(&dependency.package) {
                    expanded.extend(parents.iter().cloned());
                }
                expanded.push(dependency.clone());
            }
            // Cycles splice a package into its own list
            expanded.retain(|d| d.package != package);

            let expanded = dedup_exact(expanded);
            let expanded = dedup_exact(keep_newest(expanded)?);

            if map.get(&package) != Some(expanded.as_slice()) {
                debug!(package = %package, dependencies = expanded.len(), "expanded dependencies");
                map.insert(package, expanded);
                changed = true;
            }
        }

        Ok(changed)
    }
}

/// Rewrite every package's dependency list as its transitive closure
///
/// Entries of the external dependency map are used for expansion but are not
/// written back into the manifest.
pub fn expand_manifest(manifest: &ProjectManifest) -> Result<ProjectManifest, ValidationError> {
    let expanded = TransitiveExpander::new().expand(DependencyMap::from_manifest(manifest))?;
    Ok(apply_dependency_map(manifest, &expanded))
}

/// Copy of the manifest with package dependencies taken from the map
pub fn apply_dependency_map(manifest: &ProjectManifest, map: &DependencyMap) -> ProjectManifest {
    let mut output = manifest.clone();
    for (package, dependencies) in map.iter() {
        if let Some(descriptor) = output.package_mut(package) {
            descriptor.dependencies = dependencies.to_vec();
        }
    }
    output
}

/// Drop exact duplicates, keeping the first occurrence
fn dedup_exact(list: Vec<DependencyRef>) -> Vec<DependencyRef> {
    let mut seen = HashSet::with_capacity(list.len());
    list.into_iter().filter(|d| seen.insert(d.clone())).collect()
}

/// Keep one entry per package name: the newest version, at the first position
fn keep_newest(mut list: Vec<DependencyRef>) -> Result<Vec<DependencyRef>, ValidationError> {
    let mut j = 0;
    while j < list.len() {
        let mut i = j + 1;
        while i < list.len() {
            if list[i].package != list[j].package {
                i += 1;
                continue;
            }
            if is_newer(&list[i], &list[j])? {
                list[j] = list.remove(i);
            } else {
                list.remove(i);
            }
        }
        j += 1;
    }
    Ok(list)
}

/// Returns true if `a` carries a newer version than `b`; a missing version is oldest
pub(crate) fn is_newer(a: &DependencyRef, b: &DependencyRef) -> Result<bool, ValidationError> {
    Ok(version_order(a, b)? == Ordering::Greater)
}

pub(crate) fn version_order(
    a: &DependencyRef,
    b: &DependencyRef,
) -> Result<Ordering, ValidationError> {
    match (&a.version_number, &b.version_number) {
        (Some(x), Some(y)) => compare_versions(x, y),
        (Some(_), None) => Ok(Ordering::Greater),
        (None, Some(_)) => Ok(Ordering::Less),
        (None, None) => Ok(Ordering::Equal),
    }
}
