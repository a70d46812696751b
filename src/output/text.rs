//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Per-package dependency listings with version changes highlighted
//! - Rebuild decisions with their reasons
//! - Summary lines for manifests and plans

use crate::domain::{DependencyRef, ProjectManifest};
use crate::output::{OutputFormatter, Verbosity};
use crate::planner::{BuildPlan, PackageDecision};
use colored::Colorize;
use std::io::Write;

/// How a dependency differs between two manifests
#[derive(Debug, Clone, PartialEq, Eq)]
enum DependencyChange<'a> {
    Unchanged(&'a DependencyRef),
    Updated {
        dependency: &'a DependencyRef,
        from: Option<&'a str>,
    },
    Added(&'a DependencyRef),
    Removed(&'a DependencyRef),
}

impl DependencyChange<'_> {
    fn is_change(&self) -> bool {
        !matches!(self, DependencyChange::Unchanged(_))
    }
}

/// Compare a package's dependency lists
fn dependency_changes<'a>(
    before: &'a [DependencyRef],
    after: &'a [DependencyRef],
) -> Vec<DependencyChange<'a>> {
    let mut changes: Vec<DependencyChange<'a>> = after
        .iter()
        .map(|dep| match before.iter().find(|b| b.package == dep.package) {
            Some(old) if old.version_number == dep.version_number => {
                DependencyChange::Unchanged(dep)
            }
            Some(old) => DependencyChange::Updated {
                dependency: dep,
                from: old.version_number.as_deref(),
            },
            None => DependencyChange::Added(dep),
        })
        .collect();
    changes.extend(
        before
            .iter()
            .filter(|b| !after.iter().any(|a| a.package == b.package))
            .map(DependencyChange::Removed),
    );
    changes
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn version_display(version: Option<&str>) -> &str {
        version.unwrap_or("-")
    }

    /// Format a single dependency line
    fn format_change_line(
        &self,
        change: &DependencyChange<'_>,
        max_name_len: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        match change {
            DependencyChange::Unchanged(dep) => {
                let version = Self::version_display(dep.version_number.as_deref());
                if self.color {
                    let name = format!("{:width$}", dep.package, width = max_name_len);
                    writeln!(writer, "    {} {}", name.dimmed(), version.dimmed())
                } else {
                    writeln!(
                        writer,
                        "    {:width$} {}",
                        dep.package,
                        version,
                        width = max_name_len
                    )
                }
            }
            DependencyChange::Updated { dependency, from } => {
                let from = Self::version_display(*from);
                let to = Self::version_display(dependency.version_number.as_deref());
                if self.color {
                    let name = format!("{:width$}", dependency.package, width = max_name_len);
                    writeln!(
                        writer,
                        "    {} {} {} {}",
                        name,
                        from.dimmed(),
                        "→".dimmed(),
                        to.bright_white().bold()
                    )
                } else {
                    writeln!(
                        writer,
                        "    {:width$} {} -> {}",
                        dependency.package,
                        from,
                        to,
                        width = max_name_len
                    )
                }
            }
            DependencyChange::Added(dep) => {
                let version = Self::version_display(dep.version_number.as_deref());
                if self.color {
                    let name = format!("{:width$}", dep.package, width = max_name_len);
                    writeln!(writer, "  {} {} {}", "+".green(), name.green(), version.green())
                } else {
                    writeln!(
                        writer,
                        "  + {:width$} {}",
                        dep.package,
                        version,
                        width = max_name_len
                    )
                }
            }
            DependencyChange::Removed(dep) => {
                let version = Self::version_display(dep.version_number.as_deref());
                if self.color {
                    let name = format!("{:width$}", dep.package, width = max_name_len);
                    writeln!(writer, "  {} {} {}", "-".red(), name.red(), version.red())
                } else {
                    writeln!(
                        writer,
                        "  - {:width$} {}",
                        dep.package,
                        version,
                        width = max_name_len
                    )
                }
            }
        }
    }

    fn write_heading(&self, text: &str, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.color {
            writeln!(writer, "{}", text.bold())
        } else {
            writeln!(writer, "{}", text)
        }
    }

    fn format_decision_line(
        &self,
        decision: &PackageDecision,
        max_name_len: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let baseline = decision
            .decision
            .tag
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default();
        let reason = decision.decision.reason.message();

        if self.color {
            let marker = if decision.decision.is_to_be_built {
                "build".yellow().bold()
            } else {
                "skip ".green()
            };
            let name = format!("{:width$}", decision.package, width = max_name_len);
            writeln!(
                writer,
                "  {} {} {}{}",
                name,
                marker,
                reason,
                baseline.dimmed()
            )
        } else {
            let marker = if decision.decision.is_to_be_built {
                "build"
            } else {
                "skip "
            };
            writeln!(
                writer,
                "  {:width$} {} {}{}",
                decision.package,
                marker,
                reason,
                baseline,
                width = max_name_len
            )
        }
    }

    fn format_summary_line(&self, text: String, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.color {
            writeln!(writer, "{}", text.cyan())
        } else {
            writeln!(writer, "{}", text)
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format_manifest(
        &self,
        before: &ProjectManifest,
        after: &ProjectManifest,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let mut changed_packages = 0;
        let mut changed_dependencies = 0;

        for package in after.packages() {
            let previous = before
                .package(&package.name)
                .map(|p| p.dependencies.as_slice())
                .unwrap_or_default();
            let changes = dependency_changes(previous, &package.dependencies);
            let change_count = changes.iter().filter(|c| c.is_change()).count();
            if change_count > 0 {
                changed_packages += 1;
                changed_dependencies += change_count;
            }

            if self.verbosity == Verbosity::Quiet
                || (change_count == 0 && self.verbosity != Verbosity::Verbose)
            {
                continue;
            }

            self.write_heading(&package.name, writer)?;
            let max_name_len = package
                .dependencies
                .iter()
                .chain(previous)
                .map(|d| d.package.len())
                .max()
                .unwrap_or(0)
                .max(20);
            for change in &changes {
                if change.is_change() || self.verbosity == Verbosity::Verbose {
                    self.format_change_line(change, max_name_len, writer)?;
                }
            }
            writeln!(writer)?;
        }

        self.format_summary_line(
            format!(
                "{} {} changed in {} {}",
                changed_dependencies,
                if changed_dependencies == 1 {
                    "dependency"
                } else {
                    "dependencies"
                },
                changed_packages,
                if changed_packages == 1 {
                    "package"
                } else {
                    "packages"
                }
            ),
            writer,
        )
    }

    fn format_decisions(
        &self,
        decisions: &[PackageDecision],
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let max_name_len = decisions
            .iter()
            .map(|d| d.package.len())
            .max()
            .unwrap_or(0)
            .max(20);

        if self.verbosity != Verbosity::Quiet {
            for decision in decisions {
                if decision.decision.is_to_be_built || self.verbosity == Verbosity::Verbose {
                    self.format_decision_line(decision, max_name_len, writer)?;
                }
            }
        }

        let to_build = decisions
            .iter()
            .filter(|d| d.decision.is_to_be_built)
            .count();
        self.format_summary_line(
            format!("{} of {} packages to build", to_build, decisions.len()),
            writer,
        )
    }

    fn format_plan(&self, plan: &BuildPlan, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet {
            self.write_heading("Packages", writer)?;
            let max_name_len = plan
                .decisions
                .iter()
                .map(|d| d.package.len())
                .max()
                .unwrap_or(0)
                .max(20);
            for decision in &plan.decisions {
                self.format_decision_line(decision, max_name_len, writer)?;
            }
            writeln!(writer)?;

            for package in plan.packages_to_build() {
                let Some(dependencies) = plan.dependencies.get(package) else {
                    continue;
                };
                if dependencies.is_empty() {
                    continue;
                }
                self.write_heading(&format!("{} installs", package), writer)?;
                let max_name_len = dependencies
                    .iter()
                    .map(|d| d.package.len())
                    .max()
                    .unwrap_or(0)
                    .max(20);
                for dependency in dependencies {
                    self.format_change_line(
                        &DependencyChange::Unchanged(dependency),
                        max_name_len,
                        writer,
                    )?;
                }
                writeln!(writer)?;
            }
        }

        self.format_summary_line(
            format!(
                "{} of {} packages to build",
                plan.packages_to_build().len(),
                plan.decisions.len()
            ),
            writer,
        )
    }
}
