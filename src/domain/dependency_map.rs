//! Insertion-ordered map from package name to its dependency list

use super::manifest::{DependencyRef, ProjectManifest};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Package name to ordered dependency list
///
/// Iteration follows insertion order, which for a map built from a manifest is
/// the order of `packageDirectories` followed by external dependency entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: Vec<(String, Vec<DependencyRef>)>,
    index: HashMap<String, usize>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from a manifest's package directories and external dependency map
    ///
    /// External entries are only added for packages not built in this repository.
    pub fn from_manifest(manifest: &ProjectManifest) -> Self {
        let mut map = Self::new();
        for package in manifest.packages() {
            map.insert(package.name.clone(), package.dependencies.clone());
        }
        if let Some(external) = manifest.external_dependency_map() {
            for (package, dependencies) in external {
                if !map.contains(package) {
                    map.insert(package.clone(), dependencies.clone());
                }
            }
        }
        map
    }

    /// Insert or replace the list for a package, keeping its original position
    pub fn insert(&mut self, package: impl Into<String>, dependencies: Vec<DependencyRef>) {
        let package = package.into();
        match self.index.get(&package) {
            Some(&idx) => self.entries[idx].1 = dependencies,
            None => {
                self.index.insert(package.clone(), self.entries.len());
                self.entries.push((package, dependencies));
            }
        }
    }

    pub fn get(&self, package: &str) -> Option<&[DependencyRef]> {
        self.index
            .get(package)
            .map(|&idx| self.entries[idx].1.as_slice())
    }

    pub fn contains(&self, package: &str) -> bool {
        self.index.contains_key(package)
    }

    /// Package names in insertion order
    pub fn packages(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DependencyRef])> {
        self.entries
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DependencyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (package, dependencies) in &self.entries {
            map.serialize_entry(package, dependencies)?;
        }
        map.end()
    }
}
