//! Git history extraction using libgit2
//!
//! Walks commits from HEAD and lists the paths each one touched, using the
//! git2 crate (Rust bindings to libgit2).

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use git2::{Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths touched by one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitChanges {
    /// Short hash (12 characters)
    pub hash: String,
    /// Commit timestamp (RFC 3339)
    pub timestamp: String,
    /// Changed paths relative to the directory the history was opened for
    pub paths: Vec<String>,
}

/// Git history analyzer using libgit2.
pub struct GitHistory {
    repo: Repository,
    /// Opened directory relative to the work tree root, `/`-separated, empty at the root
    prefix: String,
}

impl GitHistory {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        debug!("Opened git repository at {:?}", repo.path());

        let workdir = repo
            .workdir()
            .context("Repository has no working directory (bare repo?)")?;
        let workdir = canonical(workdir);
        let opened = canonical(path);
        let prefix = opened
            .strip_prefix(&workdir)
            .map(|rel| crate::models::relative_locator(Path::new(""), rel))
            .unwrap_or_default();
        Ok(Self { repo, prefix })
    }

    /// Check if a path is inside a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Changed paths of up to `max_commits` commits, newest first.
    ///
    /// Paths outside the opened directory are dropped; a commit touching
    /// nothing inside it is still returned with an empty path list.
    pub fn changed_paths(&self, max_commits: usize) -> Result<Vec<CommitChanges>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_head()?;

        let mut commits = Vec::new();
        for oid_result in revwalk.take(max_commits) {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;

            let parent = commit.parent(0).ok();
            let tree = commit.tree()?;
            let parent_tree = parent.as_ref().map(|p| p.tree()).transpose()?;
            let diff = self
                .repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

            let mut paths = Vec::new();
            diff.foreach(
                &mut |delta, _| {
                    let file = delta.new_file().path().or_else(|| delta.old_file().path());
                    if let Some(path) = file {
                        let path = path.to_string_lossy().replace('\\', "/");
                        if let Some(rel) = self.relative(&path) {
                            paths.push(rel);
                        }
                    }
                    true
                },
                None,
                None,
                None,
            )?;

            let full = commit.id().to_string();
            commits.push(CommitChanges {
                hash: full.chars().take(12).collect(),
                timestamp: format_git_time(&commit.time()),
                paths,
            });
        }

        debug!("Walked {} commits", commits.len());
        Ok(commits)
    }

    fn relative(&self, repo_path: &str) -> Option<String> {
        if self.prefix.is_empty() {
            return Some(repo_path.to_string());
        }
        repo_path
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(String::from)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Format a git timestamp as RFC 3339.
fn format_git_time(time: &git2::Time) -> String {
    match Utc.timestamp_opt(time.seconds(), 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => "1970-01-01T00:00:00+00:00".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Commit `files` (path, content) on top of HEAD.
    pub(crate) fn commit_files(repo: &Repository, root: &Path, files: &[(&str, &str)], message: &str) -> Result<()> {
        let sig = git2::Signature::now("Test User", "test@example.com")?;
        let mut index = repo.index()?;
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, content)?;
            index.add_path(Path::new(path))?;
        }
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(())
    }

    #[test]
    fn test_is_git_repo() -> Result<()> {
        let dir = tempdir()?;
        Repository::init(dir.path())?;
        assert!(GitHistory::is_git_repo(dir.path()));

        let non_repo = tempdir()?;
        assert!(!GitHistory::is_git_repo(non_repo.path()));
        Ok(())
    }

    #[test]
    fn test_changed_paths() -> Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        commit_files(&repo, dir.path(), &[("a.txt", "1"), ("src/b.txt", "1")], "first")?;
        commit_files(&repo, dir.path(), &[("src/b.txt", "2")], "second")?;

        let history = GitHistory::open(dir.path())?;
        let commits = history.changed_paths(10)?;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].paths, vec!["src/b.txt"]);
        assert_eq!(commits[1].paths, vec!["a.txt", "src/b.txt"]);
        assert_eq!(commits[0].hash.len(), 12);

        assert_eq!(history.changed_paths(1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_opened_subdirectory_prefix() -> Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        commit_files(&repo, dir.path(), &[("outside.txt", "1"), ("project/in.txt", "1")], "first")?;

        let history = GitHistory::open(&dir.path().join("project"))?;
        let commits = history.changed_paths(10)?;
        assert_eq!(commits[0].paths, vec!["in.txt"]);
        Ok(())
    }
}
