//! Split coupling metrics
//!
//! Afferent/efferent coupling and instability computed separately for the
//! structural, code and runtime edge subsets, plus a composite over their
//! union. Each subset is reduced to unique (from, to) module pairs first, so
//! a pair connected by several edge types still counts once.

use crate::graph::{DependencyGraph, EdgeSubset};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouplingRecord {
    pub module: String,
    /// Modules depending on this one
    pub afferent: usize,
    /// Modules this one depends on
    pub efferent: usize,
    /// efferent / (afferent + efferent); null for a module with no edges
    pub instability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetCoupling {
    /// Mean over modules with a defined instability
    pub average_instability: Option<f64>,
    /// Sorted by descending instability, undefined last
    pub records: Vec<CouplingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouplingReport {
    pub structural: SubsetCoupling,
    pub code: SubsetCoupling,
    pub runtime: SubsetCoupling,
    pub composite: SubsetCoupling,
}

impl CouplingReport {
    pub fn subset(&self, subset: EdgeSubset) -> &SubsetCoupling {
        match subset {
            EdgeSubset::Structural => &self.structural,
            EdgeSubset::Code => &self.code,
            EdgeSubset::Runtime => &self.runtime,
        }
    }
}

pub fn compute_coupling(graph: &DependencyGraph) -> CouplingReport {
    CouplingReport {
        structural: subset_coupling(&graph.modules, &pairs_in(graph, &[EdgeSubset::Structural])),
        code: subset_coupling(&graph.modules, &pairs_in(graph, &[EdgeSubset::Code])),
        runtime: subset_coupling(&graph.modules, &pairs_in(graph, &[EdgeSubset::Runtime])),
        composite: subset_coupling(&graph.modules, &pairs_in(graph, &EdgeSubset::ALL)),
    }
}

fn pairs_in<'a>(graph: &'a DependencyGraph, subsets: &[EdgeSubset]) -> BTreeSet<(&'a str, &'a str)> {
    graph
        .edges
        .iter()
        .filter(|e| subsets.contains(&e.subset))
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect()
}

fn subset_coupling(modules: &BTreeSet<String>, pairs: &BTreeSet<(&str, &str)>) -> SubsetCoupling {
    let mut counts: BTreeMap<&str, (usize, usize)> =
        modules.iter().map(|m| (m.as_str(), (0, 0))).collect();
    for &(from, to) in pairs {
        counts.entry(to).or_default().0 += 1;
        counts.entry(from).or_default().1 += 1;
    }

    let mut records: Vec<CouplingRecord> = counts
        .into_iter()
        .map(|(module, (afferent, efferent))| CouplingRecord {
            module: module.to_string(),
            afferent,
            efferent,
            instability: instability(afferent, efferent),
        })
        .collect();
    records.sort_by(|a, b| match (a.instability, b.instability) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.module.cmp(&b.module)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.module.cmp(&b.module),
    });

    let defined: Vec<f64> = records.iter().filter_map(|r| r.instability).collect();
    let average_instability = if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    };

    SubsetCoupling {
        average_instability,
        records,
    }
}

fn instability(afferent: usize, efferent: usize) -> Option<f64> {
    let total = afferent + efferent;
    if total == 0 {
        None
    } else {
        Some(efferent as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{aggregate, EdgeType, RawEdge, SubsetMap};
    use crate::models::Evidence;
    use proptest::prelude::*;

    fn raw(from: &str, to: &str, t: EdgeType) -> RawEdge {
        RawEdge {
            from_module: from.to_string(),
            to_module: to.to_string(),
            edge_type: t,
            source_symbol: String::new(),
            target_symbol: String::new(),
            evidence: Evidence::at_lines("x.php", 1, 1, ""),
        }
    }

    #[test]
    fn test_split_subsets() {
        let mut g = aggregate(
            vec![
                raw("A", "B", EdgeType::Instantiation),
                raw("A", "B", EdgeType::TypeHint),
                raw("A", "C", EdgeType::Plugin),
                raw("C", "A", EdgeType::ModuleSequence),
            ],
            &SubsetMap::default(),
            5,
        );
        g.modules.insert("Lonely".to_string());
        let report = compute_coupling(&g);

        let code_a = report.code.records.iter().find(|r| r.module == "A").unwrap();
        assert_eq!((code_a.afferent, code_a.efferent), (0, 1));
        assert_eq!(code_a.instability, Some(1.0));

        let runtime_b = report.runtime.records.iter().find(|r| r.module == "B").unwrap();
        assert_eq!(runtime_b.instability, None);

        let composite_a = report.composite.records.iter().find(|r| r.module == "A").unwrap();
        assert_eq!((composite_a.afferent, composite_a.efferent), (1, 2));

        let last = report.composite.records.last().unwrap();
        assert_eq!(last.module, "Lonely");
        assert_eq!(last.instability, None);
    }

    #[test]
    fn test_sorted_by_instability() {
        let g = aggregate(
            vec![
                raw("A", "B", EdgeType::Instantiation),
                raw("B", "C", EdgeType::Instantiation),
            ],
            &SubsetMap::default(),
            5,
        );
        let code = compute_coupling(&g).code;
        let order: Vec<&str> = code.records.iter().map(|r| r.module.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(code.average_instability, Some(0.5));
        assert_eq!(compute_coupling(&g).structural.average_instability, None);
    }

    proptest! {
        #[test]
        fn prop_instability_bounded(edges in prop::collection::vec((0u8..6, 0u8..6), 0..30)) {
            let raw_edges = edges
                .iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| raw(&format!("M{}", a), &format!("M{}", b), EdgeType::StaticAccess))
                .collect();
            let g = aggregate(raw_edges, &SubsetMap::default(), 5);
            for record in compute_coupling(&g).composite.records {
                if let Some(i) = record.instability {
                    prop_assert!((0.0..=1.0).contains(&i));
                } else {
                    prop_assert_eq!(record.afferent + record.efferent, 0);
                }
            }
        }
    }
}
