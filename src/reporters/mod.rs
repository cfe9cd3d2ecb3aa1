//! Output reporters for modgraph analysis results
//!
//! Two kinds of output:
//! - the documents written to the output directory (always JSON, see [`json`])
//! - the run summary printed on stdout, as `text` or `json`

pub mod json;
pub mod text;

use crate::errors::{ModgraphError, ModgraphResult};
use crate::pipeline::AnalysisReport;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Supported stdout formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render the run summary in the given format
pub fn render_summary(report: &AnalysisReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report),
        OutputFormat::Json => json::render_summary(report),
    }
}

/// Write every document into `output_dir`, creating it if needed.
///
/// This is the one step whose failure aborts a run.
pub fn write_documents(report: &AnalysisReport, output_dir: &Path) -> ModgraphResult<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|source| ModgraphError::Output {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let documents = json::render_documents(report)?;
    let mut written = Vec::with_capacity(documents.len());
    for (name, content) in documents {
        let path = output_dir.join(name);
        std::fs::write(&path, content).map_err(|source| ModgraphError::Output {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{CentralityConfig, CycleConfig, HotspotConfig};
    use crate::detectors::analyze_debt;
    use crate::errors::Warning;
    use crate::graph::{aggregate, EdgeType, RawEdge, SubsetMap};
    use crate::models::Evidence;
    use crate::modules::ModuleIndex;
    use crate::pipeline::ScanStats;
    use crate::resolution::ResolutionMap;
    use crate::scoring::{compute_coupling, score_hotspots};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn raw(from: &str, to: &str, edge_type: EdgeType, line: u32) -> RawEdge {
        RawEdge {
            from_module: from.to_string(),
            to_module: to.to_string(),
            edge_type,
            source_symbol: format!("class:{}", from),
            target_symbol: format!("class:{}", to),
            evidence: Evidence::at_lines("src/A.php", line, line, "usage"),
        }
    }

    /// A small report: Acme_A uses Acme_B once and type-hints Acme_C four times.
    pub(crate) fn test_report() -> AnalysisReport {
        let mut edges = vec![raw("Acme_A", "Acme_B", EdgeType::Instantiation, 3)];
        edges.extend((10..14).map(|line| raw("Acme_A", "Acme_C", EdgeType::TypeHint, line)));
        let mut graph = aggregate(edges, &SubsetMap::default(), 5);
        graph.modules.insert("Acme_A".to_string());

        let coupling = compute_coupling(&graph);
        let debt = analyze_debt(&graph, &CycleConfig::default(), &CentralityConfig::default());
        let centrality: BTreeMap<String, f64> = debt
            .centrality
            .iter()
            .map(|c| (c.module.clone(), c.total))
            .collect();
        let hotspots = score_hotspots(&centrality, None, &HotspotConfig::default());

        AnalysisReport {
            project_root: PathBuf::from("."),
            modules: ModuleIndex::default(),
            load_order: vec!["Acme_A".to_string(), "Acme_B".to_string(), "Acme_C".to_string()],
            graph,
            coupling,
            resolutions: ResolutionMap::default(),
            delegation_chains: Vec::new(),
            plugin_seams: Vec::new(),
            debt,
            hotspots,
            stats: ScanStats::default(),
            warnings: vec![Warning::signal_unavailable("not a git repository")],
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_documents_is_reproducible() {
        let dir = tempdir().unwrap();
        let report = test_report();
        let first = write_documents(&report, dir.path()).unwrap();
        assert_eq!(first.len(), 7);
        let before: Vec<String> = first.iter().map(|p| std::fs::read_to_string(p).unwrap()).collect();

        let second = write_documents(&report, dir.path()).unwrap();
        let after: Vec<String> = second.iter().map(|p| std::fs::read_to_string(p).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_documents(&test_report(), &blocker.join("out")).unwrap_err();
        assert!(matches!(err, ModgraphError::Output { .. }));
    }
}
