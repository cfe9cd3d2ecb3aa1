//! Degree centrality detector
//!
//! Sums weighted in- and out-edges per module over a configurable edge-type
//! subset. Each module edge contributes its type weight once, regardless of
//! how many raw occurrences it aggregates. Modules whose total exceeds the
//! threshold are single points of failure.

use super::{DebtFinding, Detector};
use crate::config::CentralityConfig;
use crate::graph::{DependencyGraph, EdgeType};
use crate::models::Severity;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityScore {
    pub module: String,
    pub in_degree: f64,
    pub out_degree: f64,
    pub total: f64,
    pub single_point_of_failure: bool,
}

pub struct DegreeCentralityDetector {
    edge_types: BTreeSet<EdgeType>,
    weights: BTreeMap<EdgeType, f64>,
    threshold: f64,
}

impl DegreeCentralityDetector {
    pub fn new(config: &CentralityConfig) -> Self {
        let edge_types: BTreeSet<EdgeType> = if config.edge_types.is_empty() {
            EdgeType::ALL.iter().copied().collect()
        } else {
            config.edge_types.iter().copied().collect()
        };
        let weights = edge_types
            .iter()
            .map(|t| (*t, config.weight_for(*t)))
            .collect();
        Self {
            edge_types,
            weights,
            threshold: config.threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores for every module, highest total first.
    pub fn score(&self, graph: &DependencyGraph) -> Vec<CentralityScore> {
        let mut degrees: BTreeMap<&str, (f64, f64)> = graph
            .modules
            .iter()
            .map(|m| (m.as_str(), (0.0, 0.0)))
            .collect();

        for edge in graph.edges_of_types(&self.edge_types) {
            let weight = self.weights.get(&edge.edge_type).copied().unwrap_or(1.0);
            degrees.entry(edge.to.as_str()).or_default().0 += weight;
            degrees.entry(edge.from.as_str()).or_default().1 += weight;
        }

        let mut scores: Vec<CentralityScore> = degrees
            .into_iter()
            .map(|(module, (in_degree, out_degree))| {
                let total = in_degree + out_degree;
                CentralityScore {
                    module: module.to_string(),
                    in_degree,
                    out_degree,
                    total,
                    single_point_of_failure: total > self.threshold,
                }
            })
            .collect();
        scores.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.module.cmp(&b.module))
        });
        scores
    }

    fn create_finding(&self, score: &CentralityScore) -> DebtFinding {
        let severity = if score.total >= self.threshold * 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        DebtFinding {
            detector: "DegreeCentralityDetector".to_string(),
            severity,
            title: format!("Single point of failure: {}", score.module),
            description: format!(
                "Module `{}` has weighted degree {:.1} (in {:.1}, out {:.1}), above the threshold of {:.1}. \
                 Changes here ripple through many dependents.",
                score.module, score.total, score.in_degree, score.out_degree, self.threshold
            ),
            modules: vec![score.module.clone()],
            suggested_fix: Some(if score.in_degree >= score.out_degree {
                "Many modules depend on this one. Stabilise its public API behind service \
                 contracts and keep implementation details out of reach."
                    .to_string()
            } else {
                "This module reaches into many others. Split it along its responsibilities \
                 or route calls through fewer facades."
                    .to_string()
            }),
            evidence: Vec::new(),
        }
    }
}

impl Detector for DegreeCentralityDetector {
    fn name(&self) -> &'static str {
        "DegreeCentralityDetector"
    }

    fn description(&self) -> &'static str {
        "Flags modules whose weighted degree makes them single points of failure"
    }

    fn detect(&self, graph: &DependencyGraph) -> Vec<DebtFinding> {
        self.score(graph)
            .iter()
            .filter(|s| s.single_point_of_failure)
            .map(|s| self.create_finding(s))
            .collect()
    }
}
