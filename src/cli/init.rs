//! Init command - write a commented modgraph.toml

use anyhow::{Context, Result};
use console::style;
use std::io::Write;
use std::path::Path;

pub(super) const DEFAULT_CONFIG: &str = r#"# modgraph configuration
# Every setting below shows its default; delete what you do not change.

[scan]
# Directories to scan, relative to this file
roots = ["app/code", "app/design", "vendor"]
# Extra exclusions on top of the built-in ones (tests, node_modules, generated, ...)
exclude = []
# Set to true to drop the built-in exclusions
skip_defaults = false

[graph]
# Evidence exemplars kept per module edge; weight always counts every occurrence
max_evidence_per_edge = 5

[graph.subsets]
# Move edge types between the structural, code and runtime subsets, e.g.
# code = ["di_argument"]

[scopes]
global = "global"
order = ["global", "frontend", "adminhtml", "webapi_rest", "webapi_soap", "graphql", "crontab"]

[centrality]
# Edge types counted (empty = all)
edge_types = []
# Weighted degree above which a module is a single point of failure
threshold = 20.0
# Per-type weights; unlisted types weigh 1.0
weights = {}

[cycles]
# Edge types traversed when looking for cycles (empty = all)
edge_types = []

[hotspots]
change_weight = 0.6
centrality_weight = 0.4
threshold = 0.7

[git]
enabled = true
max_commits = 2000
timeout_secs = 30

# Extra delegation entry points (webapi.xml routes are added automatically)
# [[entry_points]]
# id = "checkout.totals"
# interface = "Vendor\\Checkout\\Api\\TotalsInterface"
# scope = "frontend"
"#;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let project = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !project.is_dir() {
        anyhow::bail!("Path is not a directory: {}", project.display());
    }

    println!("\n{} Initializing modgraph\n", style("◆").cyan().bold());

    let config_path = project.join("modgraph.toml");
    if config_path.exists() {
        println!(
            "{} {} already exists; left untouched",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    } else {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    }

    let gitignore_path = project.join(".gitignore");
    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path).unwrap_or_default();
        if !content.lines().any(|l| l.trim() == ".modgraph/") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            file.write_all(b"\n# modgraph\n.modgraph/\n")?;
            println!(
                "{} Added .modgraph/ to {}",
                style("✓").green(),
                style(".gitignore").cyan()
            );
        }
    }

    println!("\nNext steps:");
    println!("  {} Edit scan roots and scopes", style("modgraph.toml").cyan());
    println!("  {} Run analysis", style("modgraph analyze").cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_file;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modgraph.toml");
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();
        let config = load_config_file(&path).unwrap();
        assert_eq!(config.scan.roots.len(), 3);
        assert_eq!(config.graph.max_evidence_per_edge, 5);
        assert_eq!(config.scopes.order.len(), 7);
        assert!(config.git.enabled);
        assert!(config.entry_points.is_empty());
    }

    #[test]
    fn test_init_keeps_existing_config() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("modgraph.toml"), "[git]\nenabled = false\n").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "vendor/\n").unwrap();

        run(dir.path()).unwrap();
        run(dir.path()).unwrap();

        let config = std::fs::read_to_string(dir.path().join("modgraph.toml")).unwrap();
        assert_eq!(config, "[git]\nenabled = false\n");
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore.matches(".modgraph/").count(), 1);
    }
}
