//! Project manifest model
//!
//! Only the fields the resolution algorithms consume are typed; every other
//! field is carried through untouched so a resolved copy serialises back to the
//! same shape as its input.

use super::version::is_opaque_version_id;
use crate::error::ManifestError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of package a directory is published as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Plain source deployment
    Source,
    /// Registry-published versioned package
    Unlocked,
    /// Data records; exempt from ignore rules
    Data,
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageType::Source => write!(f, "source"),
            PackageType::Unlocked => write!(f, "unlocked"),
            PackageType::Data => write!(f, "data"),
        }
    }
}

/// Reference from one package to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    /// Package name, alias, or opaque version identifier
    pub package: String,
    /// Concrete, symbolic, or absent version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<String>,
}

impl DependencyRef {
    /// Creates a dependency on a specific version
    pub fn new(package: impl Into<String>, version_number: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version_number: Some(version_number.into()),
        }
    }

    /// Creates a dependency without a version (aliases pinned to an opaque id)
    pub fn unversioned(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version_number: None,
        }
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_number {
            Some(version) => write!(f, "{}@{}", self.package, version),
            None => write!(f, "{}", self.package),
        }
    }
}

/// One entry of `packageDirectories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Package name; empty for plain source folders
    #[serde(rename = "package", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Path relative to the repository root
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRef>,
    /// Fields not interpreted here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageDescriptor {
    /// Creates a descriptor with no dependencies
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            package_type: None,
            version_number: None,
            dependencies: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, package_type: PackageType) -> Self {
        self.package_type = Some(package_type);
        self
    }

    pub fn with_version(mut self, version_number: impl Into<String>) -> Self {
        self.version_number = Some(version_number.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRef>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns true for directories that are not named packages
    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }
}

/// Manifest plugin section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugins {
    /// Dependencies of packages published outside this repository
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub external_dependency_map: IndexMap<String, Vec<DependencyRef>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The project manifest (`sfdx-project.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub package_directories: Vec<PackageDescriptor>,
    /// Package name or alias to registry identity, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub package_aliases: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Plugins>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectManifest {
    /// Creates a manifest from package descriptors
    pub fn new(package_directories: Vec<PackageDescriptor>) -> Self {
        Self {
            package_directories,
            package_aliases: IndexMap::new(),
            plugins: None,
            extra: Map::new(),
        }
    }

    pub fn with_alias(mut self, name: impl Into<String>, identity: impl Into<String>) -> Self {
        self.package_aliases.insert(name.into(), identity.into());
        self
    }

    pub fn with_external_dependencies(
        mut self,
        package: impl Into<String>,
        dependencies: Vec<DependencyRef>,
    ) -> Self {
        self.plugins
            .get_or_insert_with(Plugins::default)
            .external_dependency_map
            .insert(package.into(), dependencies);
        self
    }

    /// Parse manifest JSON text
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        Self::from_json_at(content, None)
    }

    /// Parse manifest JSON text retrieved from `origin` (used in error messages)
    pub fn from_json_at(content: &str, origin: Option<&str>) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|e| ManifestError::parse_error(origin, e.to_string()))
    }

    /// Serialise to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::SerializeError {
            message: e.to_string(),
        })
    }

    /// Named package directories in declaration order
    pub fn packages(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.package_directories.iter().filter(|p| !p.is_unnamed())
    }

    /// Names of all packages in declaration order
    pub fn package_names(&self) -> Vec<String> {
        self.packages().map(|p| p.name.clone()).collect()
    }

    pub fn package(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages().find(|p| p.name == name)
    }

    pub fn package_mut(&mut self, name: &str) -> Option<&mut PackageDescriptor> {
        self.package_directories
            .iter_mut()
            .find(|p| !p.is_unnamed() && p.name == name)
    }

    /// Returns true if the package is built from this repository
    pub fn is_monorepo_package(&self, name: &str) -> bool {
        self.package(name).is_some()
    }

    /// Registry identity for a package name or alias
    pub fn alias_identity(&self, name: &str) -> Option<&str> {
        self.package_aliases.get(name).map(String::as_str)
    }

    /// Returns true if the reference already names an immutable published version
    pub fn is_pinned_to_opaque_id(&self, dependency: &DependencyRef) -> bool {
        is_opaque_version_id(&dependency.package)
            || self
                .alias_identity(&dependency.package)
                .is_some_and(is_opaque_version_id)
    }

    /// Effective type of a package: explicit type, else unlocked when aliased, else source
    pub fn package_type(&self, name: &str) -> Option<PackageType> {
        let descriptor = self.package(name)?;
        Some(match descriptor.package_type {
            Some(package_type) => package_type,
            None if self.package_aliases.contains_key(name) => PackageType::Unlocked,
            None => PackageType::Source,
        })
    }

    /// Declared dependencies of packages published outside this repository
    pub fn external_dependency_map(&self) -> Option<&IndexMap<String, Vec<DependencyRef>>> {
        self.plugins
            .as_ref()
            .map(|p| &p.external_dependency_map)
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "packageDirectories": [
            { "path": "force-app", "default": true },
            {
                "package": "core",
                "path": "packages/core",
                "versionNumber": "1.0.0.NEXT",
                "dependencies": [
                    { "package": "base", "versionNumber": "1.0.0.LATEST" },
                    { "package": "tech-framework@2.0.0.38" }
                ]
            },
            { "package": "base", "path": "packages/base", "type": "source", "versionNumber": "1.0.0.NEXT" },
            { "package": "seed", "path": "data/seed", "type": "data", "versionNumber": "1.0.0.NEXT" }
        ],
        "packageAliases": {
            "core": "0Ho000000000001AAA",
            "tech-framework@2.0.0.38": "04t000000000001AAA"
        },
        "plugins": {
            "externalDependencyMap": {
                "tech-framework@2.0.0.38": [ { "package": "sfdc-framework" } ]
            },
            "ignoreFiles": { "build": ".forceignore" }
        },
        "sourceApiVersion": "60.0"
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.package_directories.len(), 4);
        assert_eq!(manifest.package_names(), vec!["core", "base", "seed"]);

        let core = manifest.package("core").unwrap();
        assert_eq!(core.path, "packages/core");
        assert_eq!(core.dependencies.len(), 2);
        assert_eq!(core.dependencies[0], DependencyRef::new("base", "1.0.0.LATEST"));
        assert_eq!(
            core.dependencies[1],
            DependencyRef::unversioned("tech-framework@2.0.0.38")
        );
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        let json = manifest.to_json_pretty().unwrap();
        let reparsed = ProjectManifest::from_json(&json).unwrap();
        assert_eq!(manifest, reparsed);

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sourceApiVersion"], "60.0");
        assert_eq!(value["packageDirectories"][0]["default"], true);
        assert_eq!(value["plugins"]["ignoreFiles"]["build"], ".forceignore");
    }

    #[test]
    fn test_map_keys_keep_declaration_order() {
        let content = r#"{
            "packageDirectories": [ { "package": "ui", "path": "packages/ui" } ],
            "packageAliases": { "ui": "0Ho3", "core": "0Ho2", "base": "0Ho1" },
            "plugins": {
                "externalDependencyMap": {
                    "zeta@1.0.0.1": [ { "package": "base" } ],
                    "alpha@1.0.0.1": [ { "package": "core" } ]
                }
            }
        }"#;
        let manifest = ProjectManifest::from_json(content).unwrap();
        let aliases: Vec<_> = manifest.package_aliases.keys().map(String::as_str).collect();
        assert_eq!(aliases, vec!["ui", "core", "base"]);

        let written: Value =
            serde_json::from_str(&manifest.to_json_pretty().unwrap()).unwrap();
        let alias_keys: Vec<_> = written["packageAliases"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(alias_keys, vec!["ui", "core", "base"]);
        let external_keys: Vec<_> = written["plugins"]["externalDependencyMap"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(external_keys, vec!["zeta@1.0.0.1", "alpha@1.0.0.1"]);
    }

    #[test]
    fn test_package_type_defaults() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.package_type("core"), Some(PackageType::Unlocked));
        assert_eq!(manifest.package_type("base"), Some(PackageType::Source));
        assert_eq!(manifest.package_type("seed"), Some(PackageType::Data));
        assert_eq!(manifest.package_type("ghost"), None);
    }

    #[test]
    fn test_unnamed_directories_are_not_packages() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        assert!(manifest.package("").is_none());
        assert!(!manifest.is_monorepo_package("force-app"));
        assert!(manifest.is_monorepo_package("base"));
    }

    #[test]
    fn test_pinned_to_opaque_id() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        assert!(manifest.is_pinned_to_opaque_id(&DependencyRef::unversioned(
            "tech-framework@2.0.0.38"
        )));
        assert!(manifest.is_pinned_to_opaque_id(&DependencyRef::unversioned("04t000000000002AAA")));
        assert!(!manifest.is_pinned_to_opaque_id(&DependencyRef::new("core", "1.0.0.LATEST")));
    }

    #[test]
    fn test_external_dependency_map() {
        let manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        let map = manifest.external_dependency_map().unwrap();
        assert_eq!(
            map["tech-framework@2.0.0.38"],
            vec![DependencyRef::unversioned("sfdc-framework")]
        );

        let bare = ProjectManifest::new(vec![PackageDescriptor::new("core", "packages/core")]);
        assert!(bare.external_dependency_map().is_none());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = ProjectManifest::from_json_at("{", Some("HEAD")).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError { .. }));
        assert!(err.to_string().contains("at HEAD"));
    }

    #[test]
    fn test_dependency_display() {
        assert_eq!(DependencyRef::new("core", "1.0.0.1").to_string(), "core@1.0.0.1");
        assert_eq!(DependencyRef::unversioned("04tXYZ").to_string(), "04tXYZ");
    }

    #[test]
    fn test_package_mut_updates_descriptor() {
        let mut manifest = ProjectManifest::from_json(SAMPLE).unwrap();
        manifest.package_mut("base").unwrap().version_number = Some("1.1.0.NEXT".to_string());
        assert_eq!(
            manifest.package("base").unwrap().version_number.as_deref(),
            Some("1.1.0.NEXT")
        );
    }
}
