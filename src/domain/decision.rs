//! Rebuild decisions produced by the change detector

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a package is or is not rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// A file under the package path changed since the baseline
    FoundChange,
    /// The package's manifest entry differs from the baseline revision
    DescriptorChanged,
    /// Nothing relevant changed since the baseline
    NoChanges,
    /// The package has never been published from this branch
    NoPriorTag,
}

impl ChangeReason {
    /// Human-readable explanation
    pub fn message(&self) -> &'static str {
        match self {
            ChangeReason::FoundChange => "Found change(s) in package",
            ChangeReason::DescriptorChanged => "Package Descriptor Changed",
            ChangeReason::NoChanges => "No changes found",
            ChangeReason::NoPriorTag => "Previous version not found",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Whether a package needs to be rebuilt at the current HEAD
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDecision {
    pub is_to_be_built: bool,
    pub reason: ChangeReason,
    /// Baseline tag or commit the decision was made against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ChangeDecision {
    pub fn no_prior_tag() -> Self {
        Self {
            is_to_be_built: true,
            reason: ChangeReason::NoPriorTag,
            tag: None,
        }
    }

    pub fn found_change(tag: impl Into<String>) -> Self {
        Self {
            is_to_be_built: true,
            reason: ChangeReason::FoundChange,
            tag: Some(tag.into()),
        }
    }

    pub fn descriptor_changed(tag: impl Into<String>) -> Self {
        Self {
            is_to_be_built: true,
            reason: ChangeReason::DescriptorChanged,
            tag: Some(tag.into()),
        }
    }

    pub fn no_changes(tag: impl Into<String>) -> Self {
        Self {
            is_to_be_built: false,
            reason: ChangeReason::NoChanges,
            tag: Some(tag.into()),
        }
    }
}
