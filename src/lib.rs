//! monorel - Dependency resolution and change detection for monorepo releases
//!
//! This library provides the engine behind a multi-package release pipeline:
//! - Version ordering for `major.minor.patch.build` versions
//! - Resolution of `LATEST` dependency versions against a version registry
//! - Transitive dependency expansion with newest-version-wins deduplication
//! - Tag based change detection per package

pub mod cli;
pub mod diff;
pub mod domain;
pub mod error;
pub mod expand;
pub mod ignore_filter;
pub mod output;
pub mod planner;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod vcs;
