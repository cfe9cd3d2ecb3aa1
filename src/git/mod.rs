//! Change-frequency signal from git history
//!
//! Counts, per module, the distinct commits that touched a file under the
//! module root. The walk runs on its own thread and is abandoned after the
//! configured timeout; any failure degrades to "signal absent" with a
//! `signal_unavailable` warning instead of failing the run.

pub mod history;

pub use history::{CommitChanges, GitHistory};

use crate::config::GitConfig;
use crate::errors::{Extraction, Warning};
use crate::modules::ModuleResolver;
use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Change activity of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleChurn {
    /// Distinct commits touching the module
    pub commits: usize,
    /// Timestamp of the newest such commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
}

/// Attribute each commit's changed paths to modules.
pub fn module_churn(
    commits: &[CommitChanges],
    resolver: &impl ModuleResolver,
) -> BTreeMap<String, ModuleChurn> {
    let mut churn: BTreeMap<String, ModuleChurn> = BTreeMap::new();
    // Newest first, so the first timestamp seen per module is the latest
    for commit in commits {
        let touched: BTreeSet<&str> = commit
            .paths
            .iter()
            .filter_map(|p| resolver.module_for_path(Path::new(p)))
            .collect();
        for module in touched {
            let entry = churn.entry(module.to_string()).or_default();
            entry.commits += 1;
            if entry.last_changed.is_none() {
                entry.last_changed = Some(commit.timestamp.clone());
            }
        }
    }
    churn
}

/// Gather change frequency for `project_root`, bounded by `config.timeout_secs`.
///
/// Returns `None` when git is disabled, the project is not in a repository,
/// the walk fails, or it times out.
pub fn change_frequency(
    project_root: &Path,
    resolver: &impl ModuleResolver,
    config: &GitConfig,
) -> Extraction<Option<BTreeMap<String, ModuleChurn>>> {
    let mut out = Extraction::new(None);
    if !config.enabled {
        debug!("Change history disabled");
        return out;
    }
    if !GitHistory::is_git_repo(project_root) {
        out.warn(Warning::signal_unavailable(format!(
            "{} is not inside a git repository; change frequency is unavailable",
            project_root.display()
        )));
        return out;
    }

    let (tx, rx) = bounded(1);
    let root = project_root.to_path_buf();
    let max_commits = config.max_commits;
    std::thread::spawn(move || {
        let result = GitHistory::open(&root).and_then(|h| h.changed_paths(max_commits));
        // The receiver is gone after a timeout
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_secs(config.timeout_secs)) {
        Ok(Ok(commits)) => {
            info!("Read {} commits of change history", commits.len());
            out.value = Some(module_churn(&commits, resolver));
        }
        Ok(Err(e)) => out.warn(Warning::signal_unavailable(format!(
            "reading git history failed: {:#}",
            e
        ))),
        Err(RecvTimeoutError::Timeout) => out.warn(Warning::signal_unavailable(format!(
            "git history walk exceeded {}s and was abandoned",
            config.timeout_secs
        ))),
        Err(RecvTimeoutError::Disconnected) => out.warn(Warning::signal_unavailable(
            "git history worker stopped without a result",
        )),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WarningKind;
    use git2::Repository;
    use tempfile::tempdir;

    struct PrefixResolver;

    impl ModuleResolver for PrefixResolver {
        fn module_for_path(&self, path: &Path) -> Option<&str> {
            let path = path.to_str()?;
            if path.starts_with("app/code/Acme/Cart/") {
                Some("Acme_Cart")
            } else if path.starts_with("app/code/Acme/Catalog/") {
                Some("Acme_Catalog")
            } else {
                None
            }
        }

        fn module_for_type(&self, _fqcn: &str) -> Option<&str> {
            None
        }
    }

    #[test]
    fn test_module_churn_counts_distinct_commits() {
        let commits = vec![
            CommitChanges {
                hash: "b".into(),
                timestamp: "2024-02-01T00:00:00+00:00".into(),
                paths: vec![
                    "app/code/Acme/Cart/Model/Cart.php".into(),
                    "app/code/Acme/Cart/etc/di.xml".into(),
                ],
            },
            CommitChanges {
                hash: "a".into(),
                timestamp: "2024-01-01T00:00:00+00:00".into(),
                paths: vec!["app/code/Acme/Cart/a.php".into(), "README.md".into()],
            },
        ];
        let churn = module_churn(&commits, &PrefixResolver);
        assert_eq!(churn["Acme_Cart"].commits, 2);
        assert_eq!(
            churn["Acme_Cart"].last_changed.as_deref(),
            Some("2024-02-01T00:00:00+00:00")
        );
        assert!(!churn.contains_key("Acme_Catalog"));
    }

    #[test]
    fn test_change_frequency_from_repository() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        history::tests::commit_files(&repo, dir.path(), &[("app/code/Acme/Cart/a.php", "<?php")], "one")?;
        history::tests::commit_files(&repo, dir.path(), &[("app/code/Acme/Cart/a.php", "<?php //")], "two")?;
        history::tests::commit_files(&repo, dir.path(), &[("app/code/Acme/Catalog/b.php", "<?php")], "three")?;

        let result = change_frequency(dir.path(), &PrefixResolver, &GitConfig::default());
        assert!(result.warnings.is_empty());
        let churn = result.value.unwrap();
        assert_eq!(churn["Acme_Cart"].commits, 2);
        assert_eq!(churn["Acme_Catalog"].commits, 1);
        Ok(())
    }

    #[test]
    fn test_not_a_repository() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let result = change_frequency(dir.path(), &PrefixResolver, &GitConfig::default());
        assert!(result.value.is_none());
        assert_eq!(result.warnings[0].kind, WarningKind::SignalUnavailable);
        Ok(())
    }

    #[test]
    fn test_disabled() {
        let config = GitConfig {
            enabled: false,
            ..GitConfig::default()
        };
        let result = change_frequency(Path::new("."), &PrefixResolver, &config);
        assert!(result.value.is_none());
        assert!(result.warnings.is_empty());
    }
}
