//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ValidationError: Malformed versions, references or option combinations
//! - NotFoundError: Missing registry versions, branch tags or manifest entries
//! - VcsError: Failures of the underlying version control tool
//! - AmbiguousConfigurationError: Package both resolved and skipped in one pass
//! - RegistryError: Transport failures of the version registry collaborator
//! - ManifestError: Issues reading or (de)serialising the project manifest

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Input validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lookup errors
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Version control errors
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Conflicting package selections
    #[error(transparent)]
    AmbiguousConfiguration(#[from] AmbiguousConfigurationError),

    /// Version registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Manifest related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Errors raised for malformed input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Version string does not match `major.minor.patch[.build|.LATEST|.NEXT]`
    #[error("invalid version number '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    /// Dependency entry cannot be resolved as written
    #[error("invalid dependency '{dependency}' of package '{package}': {message}")]
    InvalidDependencyReference {
        package: String,
        dependency: String,
        message: String,
    },

    /// Ignore rules could not be compiled
    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidIgnorePattern { pattern: String, message: String },

    /// A required option was not supplied
    #[error("missing option {option}: {message}")]
    MissingOption { option: String, message: String },

    /// Options that cannot be combined
    #[error("conflicting options: {message}")]
    ConflictingOptions { message: String },
}

/// Errors raised when a required record does not exist
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    /// Registry returned no concrete version for the constraint
    #[error(
        "no version of '{dependency}' matching '{version}' found in registry (required by '{package}')"
    )]
    NoMatchingVersion {
        package: String,
        dependency: String,
        version: String,
    },

    /// None of the registry candidates carries a tag reachable from HEAD
    #[error(
        "no tag on the current branch matches any candidate version of '{dependency}' for '{version}' (required by '{package}', candidates: {})",
        .candidates.join(", ")
    )]
    NoBranchTag {
        package: String,
        dependency: String,
        version: String,
        candidates: Vec<String>,
    },

    /// Package is not declared in the manifest
    #[error("package '{package}' not found in project manifest")]
    PackageNotInManifest { package: String },

    /// Dependency has no package alias to look up its registry identity
    #[error("no package alias found for '{dependency}' (required by '{package}')")]
    AliasNotFound { package: String, dependency: String },
}

/// Errors raised by the version control adapter
#[derive(Error, Debug)]
pub enum VcsError {
    /// Failed to start the version control tool
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Version control tool exited with a non-zero status
    #[error("'{command}' failed with exit code {}: {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Output could not be interpreted
    #[error("unexpected output from '{command}': {message}")]
    InvalidOutput { command: String, message: String },

    /// History between the package's baseline and HEAD could not be read
    #[error("unable to compute changes for package '{package}' since '{tag}': {source}")]
    UnreachableTag {
        package: String,
        tag: String,
        #[source]
        source: Box<VcsError>,
    },
}

/// A package was requested both to be resolved and to be skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "packages cannot be both resolved and skipped in the same pass: {}",
    .packages.join(", ")
)]
pub struct AmbiguousConfigurationError {
    pub packages: Vec<String>,
}

/// Errors related to version registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package identity is unknown to the registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to query package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while querying '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// Authentication error
    #[error("authentication failed for {registry}: {message}")]
    AuthenticationError { registry: String, message: String },
}

/// Errors related to the project manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest text is not valid JSON or does not match the schema
    #[error("failed to parse project manifest{}: {message}", .origin.as_ref().map(|o| format!(" at {o}")).unwrap_or_default())]
    ParseError {
        origin: Option<String>,
        message: String,
    },

    /// Failed to write manifest file
    #[error("failed to write manifest file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be serialised
    #[error("failed to serialize project manifest: {message}")]
    SerializeError { message: String },
}

impl ValidationError {
    /// Creates a new InvalidVersion error
    pub fn invalid_version(version: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidVersion {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidDependencyReference error
    pub fn invalid_dependency(
        package: impl Into<String>,
        dependency: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError::InvalidDependencyReference {
            package: package.into(),
            dependency: dependency.into(),
            message: message.into(),
        }
    }
}

impl VcsError {
    /// Creates a new CommandFailed error
    pub fn command_failed(
        command: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        VcsError::CommandFailed {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Wraps an error with the package and baseline it was computed for
    pub fn unreachable_tag(package: impl Into<String>, tag: impl Into<String>, source: Self) -> Self {
        VcsError::UnreachableTag {
            package: package.into(),
            tag: tag.into(),
            source: Box::new(source),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::InvalidResponse {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}

impl ManifestError {
    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new ParseError
    pub fn parse_error(origin: Option<&str>, message: impl Into<String>) -> Self {
        ManifestError::ParseError {
            origin: origin.map(str::to_string),
            message: message.into(),
        }
    }
}
