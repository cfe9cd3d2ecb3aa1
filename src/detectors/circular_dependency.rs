//! Circular dependency detector
//!
//! Depth-first search over the module graph (petgraph's `depth_first_search`,
//! which keeps unvisited, in-progress and finished states). A back edge to an
//! in-progress module closes a cycle: the path slice from that module to the
//! top, with the module appended again. Cycles are deduplicated by rotating
//! them to start at their smallest member.
//!
//! Only cycles closed by a back edge are reported. A cycle that can only be
//! closed through an already finished module is not enumerated: with
//! A→B→A and A→C→B, whichever of the two cycles the walk closes first is
//! the one reported.

use super::{DebtFinding, Detector};
use crate::graph::{DependencyGraph, EdgeType};
use crate::models::{Evidence, Severity};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, DfsEvent};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One hop of a cycle with the edge types that connect it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleHop {
    pub from: String,
    pub to: String,
    pub edge_types: Vec<EdgeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cycle {
    /// Closed walk: the first module is repeated at the end
    pub modules: Vec<String>,
    /// Number of distinct modules
    pub length: usize,
    pub hops: Vec<CycleHop>,
}

/// Detects cycles restricted to a set of edge types.
pub struct CircularDependencyDetector {
    edge_types: BTreeSet<EdgeType>,
}

impl CircularDependencyDetector {
    /// An empty set means every edge type.
    pub fn new(edge_types: &[EdgeType]) -> Self {
        let edge_types = if edge_types.is_empty() {
            EdgeType::ALL.iter().copied().collect()
        } else {
            edge_types.iter().copied().collect()
        };
        Self { edge_types }
    }

    /// Calculate severity based on cycle length
    fn calculate_severity(cycle_length: usize) -> Severity {
        match cycle_length {
            n if n >= 10 => Severity::Critical,
            n if n >= 5 => Severity::High,
            n if n >= 3 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    fn suggest_fix(cycle_length: usize) -> String {
        if cycle_length >= 5 {
            "Large module cycle. Extract the shared contracts into an API module \
             that every member depends on, and move runtime bindings (preferences, \
             plugins) next to the implementation they configure."
                .to_string()
        } else {
            "Small module cycle. Merge the modules if they always change together, \
             or invert one dependency through an interface declared in the lower module."
                .to_string()
        }
    }

    /// Rotate an open cycle (no repeated closing element) to start with its
    /// smallest member.
    pub fn normalize_cycle(cycle: &[String]) -> Vec<String> {
        if cycle.is_empty() {
            return vec![];
        }

        let min_idx = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| *v)
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut normalized = Vec::with_capacity(cycle.len());
        normalized.extend_from_slice(&cycle[min_idx..]);
        normalized.extend_from_slice(&cycle[..min_idx]);
        normalized
    }

    /// Cycles closed by DFS back edges, canonicalised and deduplicated.
    ///
    /// Ordered by length, then by member list.
    pub fn find_cycles(&self, graph: &DependencyGraph) -> Vec<Cycle> {
        let mut names: BTreeSet<&str> = graph.modules.iter().map(String::as_str).collect();
        let mut hops: BTreeMap<(&str, &str), (BTreeSet<EdgeType>, Option<&Evidence>)> = BTreeMap::new();
        for edge in graph.edges_of_types(&self.edge_types) {
            names.insert(&edge.from);
            names.insert(&edge.to);
            let hop = hops
                .entry((edge.from.as_str(), edge.to.as_str()))
                .or_insert_with(|| (BTreeSet::new(), None));
            hop.0.insert(edge.edge_type);
            if hop.1.is_none() {
                hop.1 = edge.evidence.first();
            }
        }

        // Nodes and edges are inserted in sorted order so the search is stable
        let mut petgraph: DiGraph<&str, ()> = DiGraph::new();
        let index: BTreeMap<&str, NodeIndex> =
            names.iter().map(|n| (*n, petgraph.add_node(*n))).collect();
        for (from, to) in hops.keys() {
            petgraph.add_edge(index[from], index[to], ());
        }

        // Discover/Finish bracket the in-progress path; a back edge closes a cycle
        let mut found: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut path: Vec<NodeIndex> = Vec::new();
        depth_first_search(&petgraph, petgraph.node_indices(), |event| match event {
            DfsEvent::Discover(node, _) => path.push(node),
            DfsEvent::Finish(_, _) => {
                path.pop();
            }
            DfsEvent::BackEdge(_, target) => {
                if let Some(at) = path.iter().rposition(|&p| p == target) {
                    let open: Vec<String> = path[at..].iter().map(|&i| petgraph[i].to_string()).collect();
                    found.insert(Self::normalize_cycle(&open));
                }
            }
            DfsEvent::TreeEdge(_, _) | DfsEvent::CrossForwardEdge(_, _) => {}
        });

        debug!("Found {} module cycles", found.len());

        let mut cycles: Vec<Cycle> = found
            .into_iter()
            .map(|open| {
                let length = open.len();
                let mut modules = open.clone();
                modules.push(open[0].clone());
                let hops = modules
                    .windows(2)
                    .map(|pair| {
                        let (types, evidence) = hops
                            .get(&(pair[0].as_str(), pair[1].as_str()))
                            .cloned()
                            .unwrap_or_default();
                        CycleHop {
                            from: pair[0].clone(),
                            to: pair[1].clone(),
                            edge_types: types.into_iter().collect(),
                            evidence: evidence.cloned(),
                        }
                    })
                    .collect();
                Cycle {
                    modules,
                    length,
                    hops,
                }
            })
            .collect();
        cycles.sort_by(|a, b| a.length.cmp(&b.length).then_with(|| a.modules.cmp(&b.modules)));
        cycles
    }

    fn create_finding(cycle: &Cycle) -> DebtFinding {
        DebtFinding {
            detector: "CircularDependencyDetector".to_string(),
            severity: Self::calculate_severity(cycle.length),
            title: format!("Circular dependency between {} modules", cycle.length),
            description: format!("Module cycle: {}", cycle.modules.join(" -> ")),
            modules: cycle.modules[..cycle.length].to_vec(),
            suggested_fix: Some(Self::suggest_fix(cycle.length)),
            evidence: cycle.hops.iter().filter_map(|h| h.evidence.clone()).collect(),
        }
    }
}

impl Default for CircularDependencyDetector {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Detector for CircularDependencyDetector {
    fn name(&self) -> &'static str {
        "CircularDependencyDetector"
    }

    fn description(&self) -> &'static str {
        "Detects dependency cycles between modules"
    }

    fn detect(&self, graph: &DependencyGraph) -> Vec<DebtFinding> {
        self.find_cycles(graph)
            .iter()
            .map(Self::create_finding)
            .collect()
    }
}
