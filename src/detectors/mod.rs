//! Architectural-debt detectors
//!
//! Graph analytics over the module dependency graph:
//! - `CircularDependencyDetector` - module cycles, canonicalised and deduplicated
//! - `DegreeCentralityDetector` - weighted degree and single points of failure
//!
//! [`analyze_debt`] runs both and assembles the `architectural_debt.json`
//! document.

mod base;
pub mod circular_dependency;
pub mod degree_centrality;

pub use base::{DebtFinding, DetectionSummary, Detector};
pub use circular_dependency::{CircularDependencyDetector, Cycle, CycleHop};
pub use degree_centrality::{CentralityScore, DegreeCentralityDetector};

use crate::config::{CentralityConfig, CycleConfig};
use crate::graph::DependencyGraph;
use serde::Serialize;
use tracing::info;

/// Cycles, centrality scores and the findings derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchitecturalDebt {
    pub cycles: Vec<Cycle>,
    pub centrality_threshold: f64,
    pub centrality: Vec<CentralityScore>,
    pub findings: Vec<DebtFinding>,
    pub summary: DetectionSummary,
}

pub fn analyze_debt(
    graph: &DependencyGraph,
    cycles: &CycleConfig,
    centrality: &CentralityConfig,
) -> ArchitecturalDebt {
    let cycle_detector = CircularDependencyDetector::new(&cycles.edge_types);
    let centrality_detector = DegreeCentralityDetector::new(centrality);
    let detectors: [&dyn Detector; 2] = [&cycle_detector, &centrality_detector];

    let mut findings = Vec::new();
    for detector in detectors {
        let found = detector.detect(graph);
        info!("{}: {} findings", detector.name(), found.len());
        findings.extend(found);
    }
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.detector.cmp(&b.detector))
            .then_with(|| a.modules.cmp(&b.modules))
    });

    let summary = DetectionSummary::from_findings(detectors.len(), &findings);
    ArchitecturalDebt {
        cycles: cycle_detector.find_cycles(graph),
        centrality_threshold: centrality_detector.threshold(),
        centrality: centrality_detector.score(graph),
        findings,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{aggregate, EdgeType, RawEdge, SubsetMap};
    use crate::models::{Evidence, Severity};

    fn edge(from: &str, to: &str, t: EdgeType) -> RawEdge {
        RawEdge {
            from_module: from.to_string(),
            to_module: to.to_string(),
            edge_type: t,
            source_symbol: String::new(),
            target_symbol: String::new(),
            evidence: Evidence::at_lines("a.php", 3, 3, "new"),
        }
    }

    #[test]
    fn test_analyze_debt_orders_findings_by_severity() {
        let g = aggregate(
            vec![
                edge("A", "B", EdgeType::Instantiation),
                edge("B", "A", EdgeType::Plugin),
                edge("C", "A", EdgeType::TypeHint),
            ],
            &SubsetMap::default(),
            5,
        );
        let centrality = CentralityConfig {
            threshold: 2.0,
            ..CentralityConfig::default()
        };
        let debt = analyze_debt(&g, &CycleConfig::default(), &centrality);

        assert_eq!(debt.cycles.len(), 1);
        assert_eq!(debt.centrality[0].module, "A");
        // A: in 2, out 1
        assert_eq!(debt.findings[0].severity, Severity::Medium);
        assert_eq!(debt.summary.detectors_run, 2);
        assert_eq!(debt.summary.total_findings, debt.findings.len());
    }

    #[test]
    fn test_empty_graph() {
        let debt = analyze_debt(
            &DependencyGraph::default(),
            &CycleConfig::default(),
            &CentralityConfig::default(),
        );
        assert!(debt.cycles.is_empty());
        assert!(debt.findings.is_empty());
    }
}
