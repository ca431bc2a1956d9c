//! Current commit lookup, used for tag suffixes

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Something that knows the commit the images are built from
pub trait CommitSource: Send + Sync {
    fn current_commit_hash(&self) -> BuildResult<String>;
}

/// Reads `HEAD` of a git checkout via the `git` CLI
#[derive(Debug, Clone)]
pub struct GitCommitSource {
    repo: PathBuf,
}

impl GitCommitSource {
    pub fn new(repo: impl AsRef<Path>) -> Self {
        Self {
            repo: repo.as_ref().to_path_buf(),
        }
    }
}

impl CommitSource for GitCommitSource {
    fn current_commit_hash(&self) -> BuildResult<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["rev-parse", "HEAD"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| BuildError::CommitUnavailable(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(BuildError::CommitUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(BuildError::CommitUnavailable(format!(
                "git returned no commit for {}",
                self.repo.display()
            )));
        }

        tracing::debug!("Current commit: {}", hash);
        Ok(hash)
    }
}

/// A fixed commit hash
#[derive(Debug, Clone)]
pub struct StaticCommit(pub String);

impl CommitSource for StaticCommit {
    fn current_commit_hash(&self) -> BuildResult<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_static_commit() {
        let source = StaticCommit("0123456789abcdef".to_string());
        assert_eq!(source.current_commit_hash().unwrap(), "0123456789abcdef");
    }

    #[test]
    fn test_git_outside_repo() {
        let dir = tempdir().unwrap();
        let result = GitCommitSource::new(dir.path()).current_commit_hash();
        assert!(matches!(result, Err(BuildError::CommitUnavailable(_))));
    }

    #[test]
    fn test_git_head() {
        let dir = tempdir().unwrap();
        let ok = git(dir.path(), &["init", "-q"])
            && git(
                dir.path(),
                &[
                    "-c",
                    "user.name=test",
                    "-c",
                    "user.email=test@example.com",
                    "commit",
                    "-q",
                    "--allow-empty",
                    "-m",
                    "init",
                ],
            );
        if !ok {
            // git is not installed on this host
            return;
        }

        let hash = GitCommitSource::new(dir.path())
            .current_commit_hash()
            .unwrap();
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
