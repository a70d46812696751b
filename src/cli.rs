//! CLI argument parsing module for monorel

use crate::diff::{BaselineSource, DiffOptions, DEFAULT_MANIFEST_PATH};
use crate::error::{AppError, ValidationError};
use crate::registry::{HttpClient, InMemoryRegistry, RegistryClient, ToolingApiRegistry};
use crate::resolver::{ResolutionMode, ResolveOptions, DEFAULT_CONCURRENCY};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Default ignore rules file relative to the repository root
pub const DEFAULT_IGNORE_FILE: &str = ".forceignore";

/// Parse a `package=commit` pair
fn parse_commit(s: &str) -> Result<(String, String), String> {
    let (package, commit) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <package>=<commit>, got '{}'", s))?;
    let (package, commit) = (package.trim(), commit.trim());
    if package.is_empty() || commit.is_empty() {
        return Err(format!("expected <package>=<commit>, got '{}'", s));
    }
    Ok((package.to_string(), commit.to_string()))
}

/// Drop `.` components so `./a` and `a` compare equal
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Dependency resolution and change detection for monorepo package releases
#[derive(Parser, Debug, Clone)]
#[command(name = "monorel", version, about)]
pub struct CliArgs {
    /// Repository root
    #[arg(short = 'C', long, default_value = ".", global = true)]
    pub repo: PathBuf,

    /// Project manifest (default: <repo>/sfdx-project.json)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output and debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rewrite symbolic dependency versions to concrete registry versions
    Resolve(ResolveArgs),
    /// Rewrite every package's dependencies as its transitive closure
    Expand(WriteArgs),
    /// Remove dependencies already implied by another dependency
    Shrink(WriteArgs),
    /// Decide which packages changed since their last release
    Diff(DiffArgs),
    /// Diff, resolve and expand in one pass
    Plan(PlanArgs),
}

/// Where the rewritten manifest goes
#[derive(Args, Debug, Clone, Default)]
pub struct WriteArgs {
    /// Write the result back to the manifest file instead of printing changes
    #[arg(short, long)]
    pub write: bool,
}

/// Version registry connection
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Instance URL of the packaging org
    #[arg(long, env = "MONOREL_INSTANCE_URL")]
    pub instance_url: Option<String>,

    /// Access token for the packaging org
    #[arg(long, env = "MONOREL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Tooling API version
    #[arg(long, default_value = crate::registry::DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Read versions from a JSON file instead of the Tooling API
    #[arg(long)]
    pub registry_file: Option<PathBuf>,

    /// Maximum concurrent registry lookups
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Also consider versions that skipped validation
    #[arg(long)]
    pub include_unvalidated: bool,
}

impl RegistryArgs {
    /// Build the configured registry client
    pub fn build_registry(&self) -> Result<Arc<dyn RegistryClient>, AppError> {
        if let Some(path) = &self.registry_file {
            if self.instance_url.is_some() {
                return Err(ValidationError::ConflictingOptions {
                    message: "--registry-file cannot be combined with --instance-url".into(),
                }
                .into());
            }
            return Ok(Arc::new(InMemoryRegistry::from_file(path)?));
        }

        let instance_url = self.instance_url.as_deref().ok_or_else(|| {
            ValidationError::MissingOption {
                option: "--instance-url".into(),
                message: "required unless --registry-file is given".into(),
            }
        })?;
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| ValidationError::MissingOption {
                option: "--access-token".into(),
                message: "required with --instance-url".into(),
            })?;

        let client = HttpClient::new()?.with_bearer_token(token);
        Ok(Arc::new(ToolingApiRegistry::new(
            client,
            instance_url,
            self.api_version.clone(),
        )))
    }

    fn apply(&self, options: ResolveOptions) -> ResolveOptions {
        options
            .with_validated_only(!self.include_unvalidated)
            .with_concurrency(self.concurrency)
    }
}

/// Arguments of `resolve`
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub output: WriteArgs,

    /// Resolve only these packages (can be specified multiple times)
    #[arg(long = "package", action = ArgAction::Append)]
    pub packages: Vec<String>,

    /// Leave dependencies on these packages untouched (can be specified multiple times)
    #[arg(long = "skip", action = ArgAction::Append)]
    pub skip: Vec<String>,

    /// Only resolve dependencies on packages published outside this repository
    #[arg(long)]
    pub external_only: bool,
}

impl ResolveArgs {
    pub fn resolve_options(&self) -> ResolveOptions {
        let mode = if self.external_only {
            ResolutionMode::ExternalOnly
        } else {
            ResolutionMode::Build
        };
        let mut options = ResolveOptions::new()
            .with_mode(mode)
            .with_packages_to_skip(self.skip.iter().cloned());
        if !self.packages.is_empty() {
            options = options.with_packages_to_resolve(self.packages.iter().cloned());
        }
        self.registry.apply(options)
    }
}

/// Change detection settings shared by `diff` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct DiffSettings {
    /// Ignore rules file (default: <repo>/.forceignore)
    #[arg(long)]
    pub ignore_file: Option<PathBuf>,

    /// Do not rebuild packages whose only change is their manifest entry
    #[arg(long)]
    pub ignore_descriptor_changes: bool,

    /// Diff a package against a commit instead of its latest tag (<package>=<commit>)
    #[arg(long = "commit", value_parser = parse_commit, action = ArgAction::Append)]
    pub commits: Vec<(String, String)>,
}

impl DiffSettings {
    /// Ignore rules path, relative paths taken from the repository root
    pub fn ignore_path(&self, repo: &Path) -> PathBuf {
        match &self.ignore_file {
            Some(path) => path.clone(),
            None => repo.join(DEFAULT_IGNORE_FILE),
        }
    }

    /// Detection options for a manifest at `manifest_path` inside the repository
    pub fn diff_options(&self, manifest_path: &str) -> DiffOptions {
        let baseline = if self.commits.is_empty() {
            BaselineSource::LatestTag
        } else {
            BaselineSource::Commits(self.commits.iter().cloned().collect::<HashMap<_, _>>())
        };
        DiffOptions::new()
            .with_baseline(baseline)
            .with_ignore_descriptor_changes(self.ignore_descriptor_changes)
            .with_manifest_path(manifest_path)
    }
}

/// Arguments of `diff`
#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    #[command(flatten)]
    pub settings: DiffSettings,

    /// Check only these packages (can be specified multiple times)
    #[arg(long = "package", action = ArgAction::Append)]
    pub packages: Vec<String>,
}

/// Arguments of `plan`
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub diff: DiffSettings,

    /// Leave dependencies on these packages untouched (can be specified multiple times)
    #[arg(long = "skip", action = ArgAction::Append)]
    pub skip: Vec<String>,
}

impl PlanArgs {
    pub fn resolve_options(&self) -> ResolveOptions {
        self.registry
            .apply(ResolveOptions::new().with_packages_to_skip(self.skip.iter().cloned()))
    }
}

impl CliArgs {
    /// Path of the project manifest
    pub fn manifest_path(&self) -> PathBuf {
        match &self.manifest {
            Some(path) => path.clone(),
            None => self.repo.join(DEFAULT_MANIFEST_PATH),
        }
    }

    /// Manifest path as seen by the repository, used to read it at older revisions
    pub fn manifest_path_in_repo(&self) -> String {
        let path = without_cur_dir(&self.manifest_path());
        match path.strip_prefix(without_cur_dir(&self.repo)) {
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_MANIFEST_PATH.to_string()),
        }
    }
}
