//! `git diff --name-only` and revision lookups.

use std::path::{Path, PathBuf};
use std::process::Command;

use multibuild_util::process::{run_command, CommandOutput};

use crate::error::GitError;

/// Lists the paths that differ between two revisions.
pub trait RevisionDiffProvider {
    /// Paths under `dir` changed between `from` and `to`, relative to `dir`.
    /// An empty list means the revisions do not differ there.
    ///
    /// # Errors
    /// Returns an error if either revision cannot be resolved in `dir`.
    fn changed_paths(&self, from: &str, to: &str, dir: &Path) -> Result<Vec<String>, GitError>;
}

/// Talks to the `git` binary on `PATH` (or an explicit one).
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable.
    pub fn program(mut self, path: &Path) -> Self {
        self.program = path.to_path_buf();
        self
    }

    /// Resolve `rev` (a branch, tag, or commit) to a full commit hash.
    ///
    /// # Errors
    /// Returns an error if git cannot resolve the revision.
    pub fn rev_parse(&self, rev: &str, dir: &Path) -> Result<String, GitError> {
        check_revision(rev)?;
        let spec = format!("{rev}^{{commit}}");
        let output = self.git(dir, &["rev-parse", "--verify", "--quiet", &spec])?;
        let hash = output.stdout.trim();
        if !output.success || hash.is_empty() {
            return Err(GitError::RevParse {
                rev: rev.to_owned(),
                message: failure_message(&output, "no such commit"),
            });
        }
        Ok(hash.to_owned())
    }

    /// Name of the branch checked out in `dir`.
    ///
    /// # Errors
    /// Returns an error if git fails or HEAD is detached.
    pub fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        let output = self.git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.stdout.trim();
        if !output.success || branch.is_empty() {
            return Err(GitError::NoCurrentBranch {
                message: failure_message(&output, "git printed nothing"),
            });
        }
        if branch == "HEAD" {
            return Err(GitError::NoCurrentBranch {
                message: "HEAD is detached".to_owned(),
            });
        }
        Ok(branch.to_owned())
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<CommandOutput, GitError> {
        tracing::debug!(dir = %dir.display(), ?args, "running git");
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c").arg("core.quotepath=off").args(args).current_dir(dir);
        Ok(run_command(&mut cmd)?)
    }
}

impl RevisionDiffProvider for GitCli {
    fn changed_paths(&self, from: &str, to: &str, dir: &Path) -> Result<Vec<String>, GitError> {
        check_revision(from)?;
        check_revision(to)?;

        // A rename must report both sides: the old unit lost a file.
        let args = ["diff", "--name-only", "--no-renames", "--relative", from, to, "--"];
        let output = self.git(dir, &args)?;
        if !output.success {
            return Err(GitError::Diff {
                from: from.to_owned(),
                to: to.to_owned(),
                message: failure_message(&output, "git diff failed"),
            });
        }

        let paths = parse_name_only(&output.stdout);
        tracing::debug!(count = paths.len(), "changed paths");
        Ok(paths)
    }
}

/// Split `git diff --name-only` output into paths, dropping blank lines.
pub fn parse_name_only(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// Revisions that start with `-` would be read by git as options.
fn check_revision(rev: &str) -> Result<(), GitError> {
    if rev.is_empty() || rev.starts_with('-') {
        return Err(GitError::RevParse {
            rev: rev.to_owned(),
            message: "not a revision name".to_owned(),
        });
    }
    Ok(())
}

fn failure_message(output: &CommandOutput, fallback: &str) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        fallback.to_owned()
    } else {
        stderr.to_owned()
    }
}
