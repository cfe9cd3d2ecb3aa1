//! Delegation chains from entry points to concrete types
//!
//! Starting at an entry point's interface, the current type is repeatedly
//! replaced by its final type in the chosen scope until it no longer resolves
//! or a type repeats. The same walk runs in every other scope; scopes that end
//! somewhere else are reported as divergences.

use super::{ResolutionMap, ScopeList};
use crate::errors::{Extraction, Warning};
use crate::models::{ids, Evidence};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A named place where execution enters the application through an abstraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub id: String,
    pub interface: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationStep {
    pub from: String,
    pub to: String,
}

/// Outcome of following one chain in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainWalk {
    pub final_type: String,
    pub steps: Vec<DelegationStep>,
    /// The walk stopped because a type came around again
    pub self_referential: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationChain {
    pub entry: String,
    pub interface: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub final_type: String,
    pub steps: Vec<DelegationStep>,
    pub self_referential: bool,
    /// Other scopes whose final type differs from this scope's, with that type
    pub divergences: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

/// Follow `start` through `scope_map` until it stops resolving or repeats.
///
/// A type resolving to itself is a terminal binding, not a cycle.
pub fn follow_chain(start: &str, scope_map: &BTreeMap<String, String>) -> ChainWalk {
    let mut current = start.to_string();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(current.clone());
    let mut steps = Vec::new();
    let mut self_referential = false;

    while let Some(next) = scope_map.get(&current) {
        if *next == current {
            break;
        }
        if visited.contains(next) {
            self_referential = true;
            break;
        }
        steps.push(DelegationStep {
            from: current.clone(),
            to: next.clone(),
        });
        visited.insert(next.clone());
        current = next.clone();
    }

    ChainWalk {
        final_type: current,
        steps,
        self_referential,
    }
}

/// Resolve one entry point against precomputed per-scope maps.
pub fn resolve_entry_point(
    entry: &EntryPoint,
    scope_maps: &BTreeMap<String, BTreeMap<String, String>>,
    scopes: &ScopeList,
) -> DelegationChain {
    let empty = BTreeMap::new();
    let interface = ids::normalize_type(&entry.interface);
    let primary_map = scope_maps.get(&entry.scope).unwrap_or(&empty);
    let primary = follow_chain(&interface, primary_map);

    let mut divergences = BTreeMap::new();
    for scope in scopes.iter().filter(|s| *s != entry.scope) {
        let map = scope_maps.get(scope).unwrap_or(&empty);
        let other = follow_chain(&interface, map);
        if other.final_type != primary.final_type {
            divergences.insert(scope.to_string(), other.final_type);
        }
    }

    DelegationChain {
        entry: entry.id.clone(),
        interface,
        scope: entry.scope.clone(),
        method: entry.method.clone(),
        final_type: primary.final_type,
        steps: primary.steps,
        self_referential: primary.self_referential,
        divergences,
        evidence: entry.evidence.clone(),
    }
}

/// Resolve every entry point; chains are sorted by entry ID then scope.
///
/// Entry points naming a scope outside the scope list fall back to the
/// global scope with a warning.
pub fn resolve_entry_points(
    entries: &[EntryPoint],
    resolutions: &ResolutionMap,
    scopes: &ScopeList,
) -> Extraction<Vec<DelegationChain>> {
    let mut out = Extraction::new(Vec::new());
    let scope_maps = resolutions.scope_maps();

    for entry in entries {
        let chain = if scopes.contains(&entry.scope) {
            resolve_entry_point(entry, &scope_maps, scopes)
        } else {
            out.warn(Warning::invalid_declaration(
                entry
                    .evidence
                    .as_ref()
                    .map(|e| e.source.clone())
                    .unwrap_or_else(|| "config".to_string()),
                format!(
                    "entry point {} names unknown scope '{}', using '{}'",
                    entry.id,
                    entry.scope,
                    scopes.global()
                ),
            ));
            let fallback = EntryPoint {
                scope: scopes.global().to_string(),
                ..entry.clone()
            };
            resolve_entry_point(&fallback, &scope_maps, scopes)
        };
        out.value.push(chain);
    }

    out.value.sort_by(|a, b| {
        a.entry
            .cmp(&b.entry)
            .then_with(|| a.scope.cmp(&b.scope))
            .then_with(|| a.method.cmp(&b.method))
    });
    out.value.dedup_by(|a, b| a.entry == b.entry && a.scope == b.scope && a.method == b.method);
    out
}
