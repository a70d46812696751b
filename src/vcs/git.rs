//! `git` command line adapter
//!
//! Shells out to the `git` binary in the repository's working directory and
//! parses its line-oriented plumbing output.

use super::{parse_tag, VcsAdapter, TAG_VERSION_SEPARATOR};
use crate::error::VcsError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Field separator used in `for-each-ref` formats
const FIELD_SEPARATOR: char = '\t';

/// Adapter running the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    program: String,
}

impl GitCli {
    /// Create an adapter for the repository at `repo_dir`
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Run git and return stdout as UTF-8
    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, dir = %self.repo_dir.display(), "running git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VcsError::command_failed(command, output.status.code(), stderr));
        }

        String::from_utf8(output.stdout).map_err(|e| VcsError::InvalidOutput {
            command,
            message: e.to_string(),
        })
    }

    fn run_lines(&self, args: &[&str]) -> Result<Vec<String>, VcsError> {
        Ok(self
            .run(args)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Parse one `for-each-ref` line into the tag name and the commit it points at
///
/// Annotated tags report the tag object and the peeled commit; lightweight tags
/// only the commit.
fn parse_tag_ref(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split(FIELD_SEPARATOR);
    let name = fields.next()?.trim();
    let object = fields.next()?.trim();
    let peeled = fields.next().map(str::trim).unwrap_or_default();
    if name.is_empty() || object.is_empty() {
        return None;
    }
    Some((name, if peeled.is_empty() { object } else { peeled }))
}

/// Split `-z` output; paths are emitted verbatim, without quoting
fn split_nul(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

impl VcsAdapter for GitCli {
    fn tags_matching(&self, package: &str) -> Result<Vec<String>, VcsError> {
        let on_branch: HashSet<String> = self.commit_log("HEAD")?.into_iter().collect();

        let prefix = format!("{}{}", package, TAG_VERSION_SEPARATOR);
        let pattern = format!("refs/tags/{}*", prefix);
        let lines = self.run_lines(&[
            "for-each-ref",
            "--sort=creatordate",
            "--format=%(refname:strip=2)%09%(objectname)%09%(*objectname)",
            &pattern,
        ])?;

        let tags: Vec<String> = lines
            .iter()
            .filter_map(|line| parse_tag_ref(line))
            .filter(|(name, _)| parse_tag(name).is_some_and(|(p, _)| p == package))
            .filter(|(_, commit)| on_branch.contains(*commit))
            .map(|(name, _)| name.to_string())
            .collect();

        debug!(package, count = tags.len(), "tags on branch");
        Ok(tags)
    }

    fn diff(&self, from_ref: &str, to_ref: &str) -> Result<Vec<String>, VcsError> {
        let output = self.run(&[
            "diff",
            "--name-only",
            "-z",
            "--no-renames",
            from_ref,
            to_ref,
            "--",
        ])?;
        Ok(split_nul(&output))
    }

    fn commit_log(&self, ref_spec: &str) -> Result<Vec<String>, VcsError> {
        self.run_lines(&["log", "--first-parent", "--pretty=format:%H", ref_spec, "--"])
    }

    fn show(&self, rev: &str, path: &str) -> Result<String, VcsError> {
        self.run(&["show", &format!("{}:{}", rev, path)])
    }
}
