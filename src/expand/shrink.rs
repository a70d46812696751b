//! Manifest shrinking
//!
//! Removes direct dependencies that another direct dependency already brings in.

use super::{version_order, TransitiveExpander};
use crate::domain::{DependencyMap, DependencyRef, ProjectManifest};
use crate::error::ValidationError;
use std::cmp::Ordering;
use tracing::debug;

/// Reduce every package's dependency list to the entries not implied by the others
///
/// A direct dependency is dropped when the closure of a sibling dependency
/// contains the same package at the same or a newer version. Remaining entries
/// keep their order.
pub fn shrink_manifest(manifest: &ProjectManifest) -> Result<ProjectManifest, ValidationError> {
    let closures = TransitiveExpander::new().expand(DependencyMap::from_manifest(manifest))?;
    let mut output = manifest.clone();

    for descriptor in output.package_directories.iter_mut() {
        if descriptor.is_unnamed() {
            continue;
        }
        let mut kept = Vec::with_capacity(descriptor.dependencies.len());
        for dependency in &descriptor.dependencies {
            if is_implied(dependency, &descriptor.dependencies, &closures)? {
                debug!(
                    package = %descriptor.name,
                    dependency = %dependency,
                    "dropping transitively implied dependency"
                );
            } else {
                kept.push(dependency.clone());
            }
        }
        descriptor.dependencies = kept;
    }

    Ok(output)
}

fn is_implied(
    dependency: &DependencyRef,
    siblings: &[DependencyRef],
    closures: &DependencyMap,
) -> Result<bool, ValidationError> {
    for sibling in siblings.iter().filter(|s| s.package != dependency.package) {
        let Some(closure) = closures.get(&sibling.package) else {
            continue;
        };
        for implied in closure.iter().filter(|d| d.package == dependency.package) {
            if version_order(dependency, implied)? != Ordering::Greater {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
