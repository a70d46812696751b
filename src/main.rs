//! monorel - Dependency resolution and change detection for monorepo releases
//!
//! Subcommands:
//! - resolve: pin symbolic dependency versions to registry versions
//! - expand / shrink: rewrite dependency lists as closures, or back
//! - diff: decide which packages changed since their last release
//! - plan: diff, resolve and expand in one pass

use anyhow::Context;
use clap::Parser;
use monorel::cli::{CliArgs, Command, DiffArgs, DiffSettings, PlanArgs, ResolveArgs, WriteArgs};
use monorel::diff::ChangeDetector;
use monorel::domain::ProjectManifest;
use monorel::error::ManifestError;
use monorel::expand::{expand_manifest, shrink_manifest};
use monorel::ignore_filter::IgnoreFilter;
use monorel::output::{create_formatter, OutputConfig, OutputFormatter};
use monorel::planner::{BuildPlanner, PackageDecision};
use monorel::progress::Progress;
use monorel::resolver::DependencyVersionResolver;
use monorel::vcs::{GitCli, VcsAdapter};
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter
const LOG_ENV: &str = "MONOREL_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the global subscriber; `MONOREL_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init()
        .ok();
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    if args.verbose {
        eprintln!("monorel v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Repository: {}", args.repo.display());
    }

    let manifest_path = args.manifest_path();
    let manifest = load_manifest(&manifest_path)?;
    let formatter = create_formatter(OutputConfig::from_cli(
        args.json,
        args.verbose,
        args.quiet,
        args.no_color,
    ));
    let show_progress = !args.quiet && !args.json;

    match &args.command {
        Command::Resolve(resolve) => {
            let resolved = run_resolve(&args, resolve, &manifest, show_progress).await?;
            emit_manifest(formatter.as_ref(), &manifest_path, &manifest, &resolved, &resolve.output)
        }
        Command::Expand(write) => {
            let expanded = expand_manifest(&manifest)?;
            emit_manifest(formatter.as_ref(), &manifest_path, &manifest, &expanded, write)
        }
        Command::Shrink(write) => {
            let shrunk = shrink_manifest(&manifest)?;
            emit_manifest(formatter.as_ref(), &manifest_path, &manifest, &shrunk, write)
        }
        Command::Diff(diff) => run_diff(&args, diff, &manifest, formatter.as_ref()).await,
        Command::Plan(plan) => {
            run_plan(&args, plan, &manifest, formatter.as_ref(), show_progress).await
        }
    }
}

async fn run_resolve(
    args: &CliArgs,
    resolve: &ResolveArgs,
    manifest: &ProjectManifest,
    show_progress: bool,
) -> anyhow::Result<ProjectManifest> {
    let registry = resolve.registry.build_registry()?;
    let vcs: Arc<dyn VcsAdapter> = Arc::new(GitCli::new(&args.repo));
    let resolver = DependencyVersionResolver::new(registry, vcs, resolve.resolve_options());

    let mut progress = Progress::new(show_progress);
    progress.spinner("Resolving dependency versions...");
    let resolved = resolver.resolve(manifest).await;
    progress.finish_and_clear();

    Ok(resolved?)
}

async fn run_diff(
    args: &CliArgs,
    diff: &DiffArgs,
    manifest: &ProjectManifest,
    formatter: &dyn OutputFormatter,
) -> anyhow::Result<ExitCode> {
    let detector = change_detector(args, &diff.settings)?;
    let packages = if diff.packages.is_empty() {
        manifest.package_names()
    } else {
        diff.packages.clone()
    };

    let mut decisions = Vec::with_capacity(packages.len());
    let mut failures = Vec::new();
    for (package, result) in detector.detect_all(manifest, &packages).await {
        match result {
            Ok(decision) => decisions.push(PackageDecision { package, decision }),
            Err(e) => failures.push((package, e)),
        }
    }

    let mut stdout = io::stdout().lock();
    formatter.format_decisions(&decisions, &mut stdout)?;
    stdout.flush()?;

    for (package, error) in &failures {
        eprintln!("Error: {}: {}", package, error);
    }
    Ok(if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_plan(
    args: &CliArgs,
    plan: &PlanArgs,
    manifest: &ProjectManifest,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> anyhow::Result<ExitCode> {
    let registry = plan.registry.build_registry()?;
    let vcs: Arc<dyn VcsAdapter> = Arc::new(GitCli::new(&args.repo));
    let detector = change_detector(args, &plan.diff)?;
    let planner = BuildPlanner::new(registry, vcs, detector, plan.resolve_options());

    let build_plan = planner.plan_with_progress(manifest, show_progress).await?;

    let mut stdout = io::stdout().lock();
    formatter.format_plan(&build_plan, &mut stdout)?;
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn change_detector(
    args: &CliArgs,
    settings: &DiffSettings,
) -> anyhow::Result<ChangeDetector> {
    let ignore = load_ignore_rules(&settings.ignore_path(&args.repo))?;
    let vcs: Arc<dyn VcsAdapter> = Arc::new(GitCli::new(&args.repo));
    Ok(ChangeDetector::new(
        vcs,
        ignore,
        settings.diff_options(&args.manifest_path_in_repo()),
    ))
}

fn load_manifest(path: &Path) -> Result<ProjectManifest, ManifestError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))?;
    ProjectManifest::from_json_at(&content, Some(&path.display().to_string()))
}

/// Missing ignore rules mean nothing is ignored
fn load_ignore_rules(path: &Path) -> anyhow::Result<IgnoreFilter> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(IgnoreFilter::from_patterns(&content)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no ignore rules found");
            Ok(IgnoreFilter::empty())
        }
        Err(e) => {
            Err(e).with_context(|| format!("failed to read ignore rules {}", path.display()))
        }
    }
}

/// Print the rewritten manifest, writing it back to disk when requested
fn emit_manifest(
    formatter: &dyn OutputFormatter,
    path: &Path,
    before: &ProjectManifest,
    after: &ProjectManifest,
    write: &WriteArgs,
) -> anyhow::Result<ExitCode> {
    if write.write {
        let mut content = after.to_json_pretty()?;
        content.push('\n');
        std::fs::write(path, content).map_err(|e| ManifestError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "wrote manifest");
    }

    let mut stdout = io::stdout().lock();
    formatter.format_manifest(before, after, &mut stdout)?;
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}
