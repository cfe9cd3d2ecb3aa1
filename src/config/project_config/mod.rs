//! Project-level configuration support
//!
//! Loads per-project configuration from `modgraph.toml` or `.modgraphrc.json`
//! in the project root.
//!
//! # Configuration Format
//!
//! ```toml
//! # modgraph.toml
//!
//! [scan]
//! roots = ["app/code", "vendor"]
//! exclude = ["**/Test/**"]
//!
//! [graph]
//! max_evidence_per_edge = 5
//!
//! [graph.subsets]
//! code = ["di_argument"]   # move di_argument from runtime into code
//!
//! [scopes]
//! global = "global"
//! order = ["global", "frontend", "adminhtml", "graphql"]
//!
//! [centrality]
//! threshold = 20.0
//! weights = { plugin = 1.5 }
//!
//! [git]
//! max_commits = 2000
//! timeout_secs = 30
//! ```

use crate::errors::ModgraphError;
use crate::graph::{EdgeSubset, EdgeType, SubsetMap};
use crate::resolution::ScopeList;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Built-in default exclusion patterns.
/// These are applied automatically unless `skip_defaults = true` in config.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/Test/**",
    "**/Tests/**",
    "**/tests/**",
    "**/dev/**",
    "**/generated/**",
    "**/pub/static/**",
    "**/var/**",
];

/// Scopes of a stock installation, global first.
pub const DEFAULT_SCOPES: &[&str] = &[
    "global",
    "frontend",
    "adminhtml",
    "webapi_rest",
    "webapi_soap",
    "graphql",
    "crontab",
];

/// Project-level configuration loaded from modgraph.toml or similar
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub scopes: ScopeConfig,

    #[serde(default)]
    pub centrality: CentralityConfig,

    #[serde(default)]
    pub cycles: CycleConfig,

    #[serde(default)]
    pub hotspots: HotspotConfig,

    #[serde(default)]
    pub git: GitConfig,

    /// Extra delegation entry points on top of the ones declared in webapi.xml
    #[serde(default)]
    pub entry_points: Vec<EntryPointConfig>,
}

/// Which directories to scan and what to leave out
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScanConfig {
    /// Scan roots relative to the project path (empty = the project path itself)
    #[serde(default)]
    pub roots: Vec<String>,

    /// Paths/patterns to exclude from analysis
    #[serde(default)]
    pub exclude: Vec<String>,

    /// If true, disable built-in default exclusion patterns
    #[serde(default)]
    pub skip_defaults: bool,
}

impl ScanConfig {
    /// Returns effective exclusion patterns (defaults + user patterns).
    /// If `skip_defaults` is true, only user patterns are returned.
    pub fn effective_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.skip_defaults {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        for p in &self.exclude {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        patterns
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Maximum evidence exemplars kept per module-level edge (default: 5)
    #[serde(default = "default_max_evidence")]
    pub max_evidence_per_edge: usize,

    /// Reassignment of edge types to subsets
    #[serde(default)]
    pub subsets: SubsetOverrides,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_evidence_per_edge: default_max_evidence(),
            subsets: SubsetOverrides::default(),
        }
    }
}

fn default_max_evidence() -> usize {
    5
}

/// Edge types listed here are moved into the named subset; unlisted types keep
/// their default subset.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubsetOverrides {
    #[serde(default)]
    pub structural: Vec<EdgeType>,
    #[serde(default)]
    pub code: Vec<EdgeType>,
    #[serde(default)]
    pub runtime: Vec<EdgeType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Name of the distinguished global scope
    #[serde(default = "default_global_scope")]
    pub global: String,

    /// Ordered scope list
    #[serde(default = "default_scope_order")]
    pub order: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            global: default_global_scope(),
            order: default_scope_order(),
        }
    }
}

fn default_global_scope() -> String {
    "global".to_string()
}

fn default_scope_order() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CentralityConfig {
    /// Edge types counted towards centrality (empty = all)
    #[serde(default)]
    pub edge_types: Vec<EdgeType>,

    /// Weighted connection count above which a module is a single point of failure
    #[serde(default = "default_centrality_threshold")]
    pub threshold: f64,

    /// Per-type weights; unlisted types weigh 1.0
    #[serde(default)]
    pub weights: BTreeMap<EdgeType, f64>,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            edge_types: Vec::new(),
            threshold: default_centrality_threshold(),
            weights: BTreeMap::new(),
        }
    }
}

fn default_centrality_threshold() -> f64 {
    20.0
}

impl CentralityConfig {
    pub fn weight_for(&self, edge_type: EdgeType) -> f64 {
        self.weights.get(&edge_type).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CycleConfig {
    /// Edge types traversed by cycle detection (empty = all)
    #[serde(default)]
    pub edge_types: Vec<EdgeType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotspotConfig {
    /// Weight of the change-frequency percentile (default: 0.6)
    #[serde(default = "default_change_weight")]
    pub change_weight: f64,

    /// Weight of the centrality percentile (default: 0.4)
    #[serde(default = "default_centrality_weight")]
    pub centrality_weight: f64,

    /// Damped score above which a module is a high-risk hotspot (default: 0.7)
    #[serde(default = "default_hotspot_threshold")]
    pub threshold: f64,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            change_weight: default_change_weight(),
            centrality_weight: default_centrality_weight(),
            threshold: default_hotspot_threshold(),
        }
    }
}

fn default_change_weight() -> f64 {
    0.6
}
fn default_centrality_weight() -> f64 {
    0.4
}
fn default_hotspot_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum commits walked for change frequency
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,

    /// Seconds before change-history gathering is abandoned
    #[serde(default = "default_git_timeout")]
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_commits: default_max_commits(),
            timeout_secs: default_git_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_commits() -> usize {
    2000
}
fn default_git_timeout() -> u64 {
    30
}

/// A named delegation entry point
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EntryPointConfig {
    pub id: String,
    pub interface: String,
    /// Primary scope (default: the global scope)
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Load project configuration from the project root.
///
/// Searches for configuration files in this order:
/// 1. `modgraph.toml`
/// 2. `.modgraphrc.json`
///
/// Returns default configuration if no config file is found.
pub fn load_project_config(repo_path: &Path) -> ProjectConfig {
    let toml_path = repo_path.join("modgraph.toml");
    if toml_path.exists() {
        match load_config_file(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = repo_path.join(".modgraphrc.json");
    if json_path.exists() {
        match load_config_file(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

/// Load an explicitly named config file. Unlike [`load_project_config`] a
/// failure here is an error: the user asked for this file.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ModgraphError> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let config: ProjectConfig = if is_json {
        serde_json::from_str(&content)
            .map_err(|e| ModgraphError::Config(format!("{}: {}", path.display(), e)))?
    } else {
        toml::from_str(&content)
            .map_err(|e| ModgraphError::Config(format!("{}: {}", path.display(), e)))?
    };
    config.validate()?;
    Ok(config)
}

impl ProjectConfig {
    /// Reject settings no analysis could run with.
    pub fn validate(&self) -> Result<(), ModgraphError> {
        if self.graph.max_evidence_per_edge == 0 {
            return Err(ModgraphError::Config(
                "graph.max_evidence_per_edge must be at least 1".to_string(),
            ));
        }
        if self.scopes.global.trim().is_empty() {
            return Err(ModgraphError::Config("scopes.global must not be empty".to_string()));
        }
        if self.centrality.weights.values().any(|w| *w < 0.0) {
            return Err(ModgraphError::Config(
                "centrality weights must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Subset assignment with the configured overrides applied
    pub fn subset_map(&self) -> SubsetMap {
        let mut map = SubsetMap::default();
        let overrides = [
            (EdgeSubset::Structural, &self.graph.subsets.structural),
            (EdgeSubset::Code, &self.graph.subsets.code),
            (EdgeSubset::Runtime, &self.graph.subsets.runtime),
        ];
        for (subset, types) in overrides {
            for edge_type in types {
                map.assign(*edge_type, subset);
            }
        }
        map
    }

    pub fn scope_list(&self) -> ScopeList {
        ScopeList::new(self.scopes.order.clone(), self.scopes.global.clone())
    }

    /// Check if a path should be excluded
    pub fn should_exclude(&self, path: &str) -> bool {
        self.scan
            .effective_patterns()
            .iter()
            .any(|pattern| glob_match(pattern, path))
    }
}

/// Glob match over `/`-separated locators.
///
/// `**` spans any number of segments and `*` stays inside one segment. A
/// pattern without wildcards matches as a path prefix; a wildcard pattern
/// without `/` is tried against the file name only.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return path.starts_with(pattern);
    }
    if !pattern.contains('/') {
        let name = path.rsplit('/').next().unwrap_or(path);
        return segment_match(pattern.as_bytes(), name.as_bytes());
    }
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments_match(&pattern, &path)
}

fn segments_match(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| segments_match(rest, &path[skip..])),
        Some((head, rest)) => match path.split_first() {
            Some((segment, tail)) => {
                segment_match(head.as_bytes(), segment.as_bytes()) && segments_match(rest, tail)
            }
            None => false,
        },
    }
}

fn segment_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| segment_match(rest, &text[skip..])),
        Some((c, rest)) => text.first() == Some(c) && segment_match(rest, &text[1..]),
    }
}

#[cfg(test)]
mod tests;
