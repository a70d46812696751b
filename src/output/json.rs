//! JSON output formatter for machine processing

use crate::domain::ProjectManifest;
use crate::output::OutputFormatter;
use crate::planner::{BuildPlan, PackageDecision};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    fn write_json<T: Serialize + ?Sized>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)
    }
}

impl OutputFormatter for JsonFormatter {
    /// Only the rewritten manifest is written, so the output can replace the file
    fn format_manifest(
        &self,
        _before: &ProjectManifest,
        after: &ProjectManifest,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        Self::write_json(after, writer)
    }

    fn format_decisions(
        &self,
        decisions: &[PackageDecision],
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        Self::write_json(decisions, writer)
    }

    fn format_plan(&self, plan: &BuildPlan, writer: &mut dyn Write) -> std::io::Result<()> {
        Self::write_json(plan, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeDecision, DependencyMap, DependencyRef, PackageDescriptor};

    fn render<F>(f: F) -> serde_json::Value
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn test_format_manifest_writes_after() {
        let before = ProjectManifest::new(vec![PackageDescriptor::new("core", "packages/core")
            .with_dependencies(vec![DependencyRef::new("base", "1.0.0.LATEST")])]);
        let mut after = before.clone();
        after.package_mut("core").unwrap().dependencies =
            vec![DependencyRef::new("base", "1.0.0.3")];

        let json = render(|w| JsonFormatter::new().format_manifest(&before, &after, w));
        assert_eq!(
            json["packageDirectories"][0]["dependencies"][0]["versionNumber"],
            "1.0.0.3"
        );
    }

    #[test]
    fn test_format_decisions() {
        let decisions = vec![
            PackageDecision {
                package: "base".into(),
                decision: ChangeDecision::no_prior_tag(),
            },
            PackageDecision {
                package: "core".into(),
                decision: ChangeDecision::no_changes("core_v1.0.0.2"),
            },
        ];
        let json = render(|w| JsonFormatter::new().format_decisions(&decisions, w));
        assert_eq!(json[0]["package"], "base");
        assert_eq!(json[0]["reason"], "no_prior_tag");
        assert!(json[0].get("tag").is_none());
        assert_eq!(json[1]["isToBeBuilt"], false);
        assert_eq!(json[1]["tag"], "core_v1.0.0.2");
    }

    #[test]
    fn test_format_plan() {
        let mut dependencies = DependencyMap::new();
        dependencies.insert("core", vec![DependencyRef::new("base", "1.0.0.3")]);
        let plan = BuildPlan {
            manifest: ProjectManifest::new(vec![PackageDescriptor::new("core", "packages/core")]),
            dependencies,
            decisions: vec![],
        };
        let json = render(|w| JsonFormatter::new().format_plan(&plan, w));
        assert_eq!(json["dependencies"]["core"][0]["package"], "base");
        assert!(json["decisions"].as_array().unwrap().is_empty());
    }
}
