//! Configuration module for modgraph
//!
//! This module handles:
//! - Project-level configuration (modgraph.toml)
//! - Edge-subset reassignment and centrality weights
//! - The ordered scope list and its global scope
//! - Hotspot and change-history settings

mod project_config;

pub use project_config::{
    glob_match, load_config_file, load_project_config, CentralityConfig, CycleConfig,
    EntryPointConfig, GitConfig, GraphConfig, HotspotConfig, ProjectConfig, ScanConfig,
    ScopeConfig, SubsetOverrides, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_SCOPES,
};
