//! Gitignore-style path filtering
//!
//! Used to drop files matched by the project's ignore rules from a diff before
//! deciding whether a package changed.

use crate::error::ValidationError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;
use tracing::debug;

/// Compiled set of ignore patterns
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    matcher: Gitignore,
}

impl IgnoreFilter {
    /// Filter that ignores nothing
    pub fn empty() -> Self {
        Self {
            matcher: Gitignore::empty(),
        }
    }

    /// Compile raw pattern text, one gitignore pattern per line
    pub fn from_patterns(patterns: &str) -> Result<Self, ValidationError> {
        let mut builder = GitignoreBuilder::new(".");
        for line in patterns.lines() {
            builder
                .add_line(None, line)
                .map_err(|e| ValidationError::InvalidIgnorePattern {
                    pattern: line.to_string(),
                    message: e.to_string(),
                })?;
        }
        let matcher = builder
            .build()
            .map_err(|e| ValidationError::InvalidIgnorePattern {
                pattern: patterns.to_string(),
                message: e.to_string(),
            })?;
        debug!(patterns = matcher.num_ignores(), "compiled ignore rules");
        Ok(Self { matcher })
    }

    /// Returns true if the repository-relative path, or any of its parent directories, is ignored
    pub fn is_ignored(&self, path: &str) -> bool {
        if self.matcher.is_empty() {
            return false;
        }
        let path = normalize(path);
        if path.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(Path::new(&path), false)
            .is_ignore()
    }

    /// Keep only the paths not matched by the ignore rules
    pub fn filter(&self, paths: Vec<String>) -> Vec<String> {
        paths.into_iter().filter(|p| !self.is_ignored(p)).collect()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::empty()
    }
}

/// Filter `paths` against gitignore `patterns`
pub fn filter(paths: Vec<String>, patterns: &str) -> Result<Vec<String>, ValidationError> {
    Ok(IgnoreFilter::from_patterns(patterns)?.filter(paths))
}

/// Repository-relative path with forward slashes and no leading `./` or `/`
pub(crate) fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_start_matches('/').trim_end_matches('/');
    if path == "." {
        return String::new();
    }
    path.to_string()
}
