//! Version control adapter
//!
//! This module provides:
//! - The `VcsAdapter` trait consumed by the change detector and resolver
//! - A `git` command line implementation
//! - Helpers for `<package>_v<version>` release tags

mod git;

pub use git::GitCli;

use crate::error::VcsError;

/// Separator between package name and version in release tags
pub const TAG_VERSION_SEPARATOR: &str = "_v";

/// Read-only view of a source repository
pub trait VcsAdapter: Send + Sync {
    /// Tags `<package>_v*` reachable from HEAD by first-parent traversal, oldest first
    fn tags_matching(&self, package: &str) -> Result<Vec<String>, VcsError>;

    /// Paths changed between two refs, names only, without rename detection
    fn diff(&self, from_ref: &str, to_ref: &str) -> Result<Vec<String>, VcsError>;

    /// Commit hashes following first parents only, newest first
    fn commit_log(&self, ref_spec: &str) -> Result<Vec<String>, VcsError>;

    /// Contents of `path` at revision `rev`
    fn show(&self, rev: &str, path: &str) -> Result<String, VcsError>;
}

/// Release tag name for a package version
pub fn tag_name(package: &str, version: &str) -> String {
    format!("{}{}{}", package, TAG_VERSION_SEPARATOR, version)
}

/// Split a release tag into package name and version
pub fn parse_tag(tag: &str) -> Option<(&str, &str)> {
    let (package, version) = tag.rsplit_once(TAG_VERSION_SEPARATOR)?;
    if package.is_empty() || version.is_empty() {
        return None;
    }
    Some((package, version))
}

/// Returns true if the tag belongs to the package and marks exactly this version
pub fn tag_matches_version(tag: &str, version: &str) -> bool {
    tag.strip_suffix(version)
        .is_some_and(|rest| rest.ends_with(TAG_VERSION_SEPARATOR))
}

/// Newest tag for a package on the current branch
pub fn latest_tag(vcs: &dyn VcsAdapter, package: &str) -> Result<Option<String>, VcsError> {
    Ok(vcs.tags_matching(package)?.pop())
}
