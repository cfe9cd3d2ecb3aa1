//! Edge types, subsets, and graph records

use crate::models::Evidence;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Kind of dependency an edge represents.
///
/// Every edge type belongs to exactly one [`EdgeSubset`]; the default
/// partition is given by [`EdgeType::default_subset`] and can be reassigned
/// through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    // structural
    ModuleSequence,
    ComposerRequire,
    ThemeParent,
    // code
    Instantiation,
    StaticAccess,
    Inheritance,
    InterfaceImplementation,
    TraitUse,
    TypeHint,
    CatchType,
    InstanceOf,
    // runtime
    DiPreference,
    DiVirtualType,
    DiArgument,
    Plugin,
    EventObserver,
}

impl EdgeType {
    pub const ALL: [EdgeType; 16] = [
        EdgeType::ModuleSequence,
        EdgeType::ComposerRequire,
        EdgeType::ThemeParent,
        EdgeType::Instantiation,
        EdgeType::StaticAccess,
        EdgeType::Inheritance,
        EdgeType::InterfaceImplementation,
        EdgeType::TraitUse,
        EdgeType::TypeHint,
        EdgeType::CatchType,
        EdgeType::InstanceOf,
        EdgeType::DiPreference,
        EdgeType::DiVirtualType,
        EdgeType::DiArgument,
        EdgeType::Plugin,
        EdgeType::EventObserver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::ModuleSequence => "module_sequence",
            EdgeType::ComposerRequire => "composer_require",
            EdgeType::ThemeParent => "theme_parent",
            EdgeType::Instantiation => "instantiation",
            EdgeType::StaticAccess => "static_access",
            EdgeType::Inheritance => "inheritance",
            EdgeType::InterfaceImplementation => "interface_implementation",
            EdgeType::TraitUse => "trait_use",
            EdgeType::TypeHint => "type_hint",
            EdgeType::CatchType => "catch_type",
            EdgeType::InstanceOf => "instance_of",
            EdgeType::DiPreference => "di_preference",
            EdgeType::DiVirtualType => "di_virtual_type",
            EdgeType::DiArgument => "di_argument",
            EdgeType::Plugin => "plugin",
            EdgeType::EventObserver => "event_observer",
        }
    }

    pub fn default_subset(&self) -> EdgeSubset {
        match self {
            EdgeType::ModuleSequence | EdgeType::ComposerRequire | EdgeType::ThemeParent => {
                EdgeSubset::Structural
            }
            EdgeType::Instantiation
            | EdgeType::StaticAccess
            | EdgeType::Inheritance
            | EdgeType::InterfaceImplementation
            | EdgeType::TraitUse
            | EdgeType::TypeHint
            | EdgeType::CatchType
            | EdgeType::InstanceOf => EdgeSubset::Code,
            EdgeType::DiPreference
            | EdgeType::DiVirtualType
            | EdgeType::DiArgument
            | EdgeType::Plugin
            | EdgeType::EventObserver => EdgeSubset::Runtime,
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown edge type '{}'", s))
    }
}

/// The three disjoint edge-type subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSubset {
    Structural,
    Code,
    Runtime,
}

impl EdgeSubset {
    pub const ALL: [EdgeSubset; 3] = [EdgeSubset::Structural, EdgeSubset::Code, EdgeSubset::Runtime];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSubset::Structural => "structural",
            EdgeSubset::Code => "code",
            EdgeSubset::Runtime => "runtime",
        }
    }
}

/// Assignment of every edge type to exactly one subset.
///
/// Stored as a total map so the subsets can never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetMap {
    assignment: BTreeMap<EdgeType, EdgeSubset>,
}

impl Default for SubsetMap {
    fn default() -> Self {
        Self {
            assignment: EdgeType::ALL
                .iter()
                .map(|t| (*t, t.default_subset()))
                .collect(),
        }
    }
}

impl SubsetMap {
    /// Move `edge_type` into `subset`, removing it from wherever it was.
    pub fn assign(&mut self, edge_type: EdgeType, subset: EdgeSubset) {
        self.assignment.insert(edge_type, subset);
    }

    pub fn subset_of(&self, edge_type: EdgeType) -> EdgeSubset {
        self.assignment
            .get(&edge_type)
            .copied()
            .unwrap_or_else(|| edge_type.default_subset())
    }

    pub fn members(&self, subset: EdgeSubset) -> BTreeSet<EdgeType> {
        self.assignment
            .iter()
            .filter(|(_, s)| **s == subset)
            .map(|(t, _)| *t)
            .collect()
    }
}

/// Class/method-level edge before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub from_module: String,
    pub to_module: String,
    pub edge_type: EdgeType,
    /// Canonical ID of the symbol the usage occurs in (class, method, or module)
    pub source_symbol: String,
    /// Canonical ID of the referenced symbol
    pub target_symbol: String,
    pub evidence: Evidence,
}

/// Aggregated module-level edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEdge {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub subset: EdgeSubset,
    /// True number of raw occurrences
    pub weight: usize,
    /// First-seen exemplars, capped at the configured maximum
    pub evidence: Vec<Evidence>,
}

/// Module-level typed dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Every known module ID, including isolated ones
    pub modules: BTreeSet<String>,
    /// Edges sorted by descending weight, then (from, to, type)
    pub edges: Vec<ModuleEdge>,
}

impl DependencyGraph {
    pub fn edges_of_types<'a>(
        &'a self,
        types: &'a BTreeSet<EdgeType>,
    ) -> impl Iterator<Item = &'a ModuleEdge> + 'a {
        self.edges.iter().filter(move |e| types.contains(&e.edge_type))
    }

    /// Edge counts per type, for summaries.
    pub fn counts_by_type(&self) -> BTreeMap<EdgeType, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.edge_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn counts_by_subset(&self) -> BTreeMap<EdgeSubset, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.subset).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_round_trips_through_str() {
        for t in EdgeType::ALL {
            assert_eq!(t.as_str().parse::<EdgeType>().unwrap(), t);
        }
        assert!("imports".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_default_subsets_partition_all_types() {
        let map = SubsetMap::default();
        let total: usize = EdgeSubset::ALL.iter().map(|s| map.members(*s).len()).sum();
        assert_eq!(total, EdgeType::ALL.len());
        assert!(map.members(EdgeSubset::Code).contains(&EdgeType::TypeHint));
        assert!(map.members(EdgeSubset::Runtime).contains(&EdgeType::Plugin));
        assert!(map
            .members(EdgeSubset::Structural)
            .contains(&EdgeType::ModuleSequence));
    }

    #[test]
    fn test_reassign_moves_type_between_subsets() {
        let mut map = SubsetMap::default();
        map.assign(EdgeType::DiArgument, EdgeSubset::Code);
        assert!(map.members(EdgeSubset::Code).contains(&EdgeType::DiArgument));
        assert!(!map.members(EdgeSubset::Runtime).contains(&EdgeType::DiArgument));
    }
}
