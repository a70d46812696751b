//! Core domain models for monorel
//!
//! This module contains the fundamental types used throughout the application:
//! - Version numbers and their ordering
//! - The project manifest and its package descriptors
//! - Dependency maps handed between the resolver and the expander
//! - Rebuild decisions

mod decision;
mod dependency_map;
mod manifest;
mod version;

pub use decision::{ChangeDecision, ChangeReason};
pub use dependency_map::DependencyMap;
pub use manifest::{DependencyRef, PackageDescriptor, PackageType, Plugins, ProjectManifest};
pub use version::{
    compare_versions, is_opaque_version_id, BuildSegment, VersionNumber, OPAQUE_VERSION_ID_PREFIX,
};
