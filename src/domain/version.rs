//! Package version numbers and their ordering
//!
//! Versions have the form `major.minor.patch[.build]` where the optional build
//! segment is either a number or one of the symbolic markers `LATEST` and `NEXT`.
//! Ordering reuses semver precedence by turning the build number into a
//! pre-release identifier (`1.2.3.4` is ordered as `1.2.3-4`).

use crate::error::ValidationError;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Prefix of registry-issued immutable package version identifiers
pub const OPAQUE_VERSION_ID_PREFIX: &str = "04t";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:\.([A-Za-z0-9]+))?$").unwrap());

/// The fourth segment of a version number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildSegment {
    /// Concrete build number
    Number(u64),
    /// Newest validated build of the given major.minor.patch
    Latest,
    /// Build number assigned on the next publish
    Next,
}

impl fmt::Display for BuildSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSegment::Number(n) => write!(f, "{}", n),
            BuildSegment::Latest => write!(f, "LATEST"),
            BuildSegment::Next => write!(f, "NEXT"),
        }
    }
}

/// A parsed `major.minor.patch[.build]` version number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionNumber {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: Option<BuildSegment>,
}

impl VersionNumber {
    /// Parse a version string, rejecting unknown build segments
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let caps = VERSION_RE.captures(input.trim()).ok_or_else(|| {
            ValidationError::invalid_version(input, "expected major.minor.patch[.build]")
        })?;

        let number = |idx: usize| -> Result<u64, ValidationError> {
            caps[idx]
                .parse()
                .map_err(|_| ValidationError::invalid_version(input, "segment out of range"))
        };

        let build = match caps.get(4).map(|m| m.as_str()) {
            None => None,
            Some("LATEST") => Some(BuildSegment::Latest),
            Some("NEXT") => Some(BuildSegment::Next),
            Some(segment) => match segment.parse::<u64>() {
                Ok(n) => Some(BuildSegment::Number(n)),
                Err(_) => {
                    return Err(ValidationError::invalid_version(
                        input,
                        format!(
                            "build segment '{}' must be a number, LATEST or NEXT",
                            segment
                        ),
                    ))
                }
            },
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            build,
        })
    }

    /// Returns true if the build segment is `LATEST` or `NEXT`
    pub fn is_symbolic(&self) -> bool {
        matches!(self.build, Some(BuildSegment::Latest | BuildSegment::Next))
    }

    /// Returns true for a fully concrete four-segment version
    pub fn is_concrete(&self) -> bool {
        matches!(self.build, Some(BuildSegment::Number(_)))
    }

    /// Drops a symbolic build segment, keeping numeric builds
    pub fn without_symbolic_build(&self) -> Self {
        let build = match self.build {
            Some(BuildSegment::Number(n)) => Some(BuildSegment::Number(n)),
            _ => None,
        };
        Self { build, ..*self }
    }

    /// The semver value this version is ordered by
    pub fn precedence(&self) -> Version {
        let pre = match self.build {
            Some(BuildSegment::Number(n)) => {
                Prerelease::new(&n.to_string()).unwrap_or(Prerelease::EMPTY)
            }
            _ => Prerelease::EMPTY,
        };
        Version {
            major: self.major,
            minor: self.minor,
            patch: self.patch,
            pre,
            build: BuildMetadata::EMPTY,
        }
    }

    /// Compare two versions, ignoring symbolic build segments
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.precedence().cmp(&other.precedence())
    }

    /// Returns true if `self` matches a registry constraint such as `1.2.3` or `1.2.3.4`
    pub fn satisfies(&self, constraint: &VersionNumber) -> bool {
        let base = self.major == constraint.major
            && self.minor == constraint.minor
            && self.patch == constraint.patch;
        match constraint.build {
            Some(BuildSegment::Number(n)) => base && self.build == Some(BuildSegment::Number(n)),
            _ => base,
        }
    }
}

impl FromStr for VersionNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
        }
        Ok(())
    }
}

/// Compare two version strings
///
/// `LATEST` and `NEXT` build segments are stripped before comparison, so
/// `1.0.0.LATEST` compares equal to `1.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, ValidationError> {
    let a = VersionNumber::parse(a)?;
    let b = VersionNumber::parse(b)?;
    Ok(a.cmp_precedence(&b))
}

/// Returns true if the value is a registry-issued immutable version identifier
pub fn is_opaque_version_id(value: &str) -> bool {
    value.starts_with(OPAQUE_VERSION_ID_PREFIX)
        && matches!(value.len(), 15 | 18)
        && value.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_versions(a, b).unwrap()
    }

    #[test]
    fn test_parse_concrete() {
        let v = VersionNumber::parse("1.2.3.4").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.build, Some(BuildSegment::Number(4)));
        assert!(v.is_concrete());
        assert!(!v.is_symbolic());
    }

    #[test]
    fn test_parse_symbolic() {
        let latest = VersionNumber::parse("1.2.3.LATEST").unwrap();
        assert_eq!(latest.build, Some(BuildSegment::Latest));
        assert!(latest.is_symbolic());

        let next = VersionNumber::parse("1.2.3.NEXT").unwrap();
        assert_eq!(next.build, Some(BuildSegment::Next));
        assert!(next.is_symbolic());
    }

    #[test]
    fn test_parse_three_segments() {
        let v = VersionNumber::parse("2.0.1").unwrap();
        assert_eq!(v.build, None);
        assert!(!v.is_concrete());
        assert_eq!(v.to_string(), "2.0.1");
    }

    #[test]
    fn test_parse_rejects_unknown_build_segment() {
        let err = VersionNumber::parse("1.0.0.BETA").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidVersion { .. }));
        assert!(err.to_string().contains("BETA"));
    }

    #[test]
    fn test_parse_rejects_lowercase_latest() {
        assert!(VersionNumber::parse("1.0.0.latest").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(VersionNumber::parse("").is_err());
        assert!(VersionNumber::parse("1.0").is_err());
        assert!(VersionNumber::parse("1.0.0.0.0").is_err());
        assert!(VersionNumber::parse("v1.0.0").is_err());
    }

    #[test]
    fn test_without_symbolic_build() {
        let v = VersionNumber::parse("1.2.3.LATEST").unwrap();
        assert_eq!(v.without_symbolic_build().to_string(), "1.2.3");

        let v = VersionNumber::parse("1.2.3.7").unwrap();
        assert_eq!(v.without_symbolic_build().to_string(), "1.2.3.7");
    }

    #[test]
    fn test_build_numbers_compare_numerically() {
        assert_eq!(cmp("1.0.0.10", "1.0.0.9"), Ordering::Greater);
        assert_eq!(cmp("1.0.0.9", "1.0.0.10"), Ordering::Less);
    }

    #[test]
    fn test_compare_equal() {
        assert_eq!(cmp("1.0.0.1", "1.0.0.1"), Ordering::Equal);
        assert_eq!(cmp("3.2.1", "3.2.1"), Ordering::Equal);
    }

    #[test]
    fn test_compare_major_minor_patch_dominate_build() {
        assert_eq!(cmp("1.0.1.0", "1.0.0.99"), Ordering::Greater);
        assert_eq!(cmp("1.1.0.0", "1.0.9.99"), Ordering::Greater);
        assert_eq!(cmp("2.0.0.0", "1.9.9.99"), Ordering::Greater);
    }

    #[test]
    fn test_compare_latest_is_stripped() {
        assert_eq!(cmp("1.0.0.LATEST", "1.0.0"), Ordering::Equal);
        assert_eq!(cmp("1.0.1.LATEST", "1.0.0.5"), Ordering::Greater);
    }

    #[test]
    fn test_compare_invalid_input_fails() {
        assert!(compare_versions("1.0.0.x1", "1.0.0.1").is_err());
        assert!(compare_versions("1.0.0.1", "garbage").is_err());
    }

    #[test]
    fn test_compare_is_antisymmetric_and_transitive() {
        let versions = ["1.0.0.1", "1.0.0.2", "1.0.0.10", "1.0.0", "1.0.1.0", "1.1.0", "2.0.0.1"];
        for a in versions {
            assert_eq!(cmp(a, a), Ordering::Equal);
            for b in versions {
                assert_eq!(cmp(a, b), cmp(b, a).reverse(), "{} vs {}", a, b);
                for c in versions {
                    if cmp(a, b) == Ordering::Less && cmp(b, c) == Ordering::Less {
                        assert_eq!(cmp(a, c), Ordering::Less, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_satisfies() {
        let constraint = VersionNumber::parse("1.2.3").unwrap();
        assert!(VersionNumber::parse("1.2.3.9").unwrap().satisfies(&constraint));
        assert!(!VersionNumber::parse("1.2.4.0").unwrap().satisfies(&constraint));

        let exact = VersionNumber::parse("1.2.3.4").unwrap();
        assert!(VersionNumber::parse("1.2.3.4").unwrap().satisfies(&exact));
        assert!(!VersionNumber::parse("1.2.3.5").unwrap().satisfies(&exact));
    }

    #[test]
    fn test_is_opaque_version_id() {
        assert!(is_opaque_version_id("04t1t000003DLAMAA4"));
        assert!(is_opaque_version_id("04t1t000003DLAM"));
        assert!(!is_opaque_version_id("0Ho1t000000PAd4CAG"));
        assert!(!is_opaque_version_id("04t"));
        assert!(!is_opaque_version_id("core"));
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["1.2.3", "1.2.3.4", "1.2.3.LATEST", "1.2.3.NEXT"] {
            assert_eq!(VersionNumber::parse(input).unwrap().to_string(), input);
        }
    }
}
