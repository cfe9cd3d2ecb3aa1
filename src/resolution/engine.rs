//! Layered override resolution: global baseline plus scope overlay, last writer wins
//!
//! For every target with at least one declaration the engine builds, per scope,
//! the ordered list of resolution steps that apply there. In a non-global scope
//! that list is the global declarations followed by the scope's own
//! declarations; the last step is the final type.

use super::ScopeList;
use crate::models::Evidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Confidence when several declarations competed for one scope.
pub const CONTESTED_CONFIDENCE: f64 = 0.95;

/// One raw override declaration ("references to target resolve to `resolved_type`").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideDeclaration {
    pub resolved_type: String,
    /// Declaring module
    pub module: String,
    pub evidence: Evidence,
}

/// Raw declarations grouped target → scope → declarations in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    by_target: BTreeMap<String, BTreeMap<String, Vec<OverrideDeclaration>>>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: impl Into<String>, scope: impl Into<String>, decl: OverrideDeclaration) {
        self.by_target
            .entry(target.into())
            .or_default()
            .entry(scope.into())
            .or_default()
            .push(decl);
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    pub fn declarations(
        &self,
    ) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<OverrideDeclaration>>)> {
        self.by_target.iter()
    }
}

/// One step of a scope's resolution chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStep {
    /// Scope the declaration was made in (the global scope for inherited steps)
    pub scope: String,
    pub resolved_type: String,
    pub module: String,
    pub evidence: Evidence,
}

/// How a target resolves in one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeResolution {
    pub steps: Vec<ResolutionStep>,
    pub final_type: String,
    pub confidence: f64,
}

impl ScopeResolution {
    fn from_steps(steps: Vec<ResolutionStep>) -> Option<Self> {
        let final_type = steps.last()?.resolved_type.clone();
        let confidence = if steps.len() == 1 {
            1.0
        } else {
            CONTESTED_CONFIDENCE
        };
        Some(Self {
            steps,
            final_type,
            confidence,
        })
    }
}

/// A named override point and its per-scope resolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionTarget {
    pub target: String,
    pub scopes: BTreeMap<String, ScopeResolution>,
}

/// Resolution of every declared target in every scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMap {
    pub global_scope: String,
    pub scope_order: Vec<String>,
    /// Keyed (and therefore sorted) by target name
    pub targets: BTreeMap<String, ResolutionTarget>,
}

impl ResolutionMap {
    pub fn build(overrides: &OverrideSet, scopes: &ScopeList) -> Self {
        let global = scopes.global();
        let mut targets = BTreeMap::new();

        for (target, by_scope) in overrides.declarations() {
            for scope in by_scope.keys() {
                if !scopes.contains(scope) {
                    debug!("Ignoring declarations for {} in unknown scope {}", target, scope);
                }
            }

            let global_steps: Vec<ResolutionStep> = by_scope
                .get(global)
                .map(|decls| to_steps(global, decls))
                .unwrap_or_default();

            let mut resolved = BTreeMap::new();
            for scope in scopes.iter() {
                let steps = if scopes.is_global(scope) {
                    global_steps.clone()
                } else {
                    let mut steps = global_steps.clone();
                    if let Some(decls) = by_scope.get(scope) {
                        steps.extend(to_steps(scope, decls));
                    }
                    steps
                };
                if let Some(resolution) = ScopeResolution::from_steps(steps) {
                    resolved.insert(scope.to_string(), resolution);
                }
            }

            if !resolved.is_empty() {
                targets.insert(
                    target.clone(),
                    ResolutionTarget {
                        target: target.clone(),
                        scopes: resolved,
                    },
                );
            }
        }

        debug!("Built resolutions for {} targets", targets.len());

        Self {
            global_scope: global.to_string(),
            scope_order: scopes.iter().map(String::from).collect(),
            targets,
        }
    }

    pub fn resolve(&self, target: &str, scope: &str) -> Option<&ScopeResolution> {
        self.targets.get(target)?.scopes.get(scope)
    }

    pub fn final_type(&self, target: &str, scope: &str) -> Option<&str> {
        self.resolve(target, scope).map(|r| r.final_type.as_str())
    }

    /// Flattened target → final type map for one scope.
    pub fn scope_map(&self, scope: &str) -> BTreeMap<String, String> {
        self.targets
            .iter()
            .filter_map(|(target, t)| {
                t.scopes
                    .get(scope)
                    .map(|r| (target.clone(), r.final_type.clone()))
            })
            .collect()
    }

    /// Scope maps for every scope in order.
    pub fn scope_maps(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.scope_order
            .iter()
            .map(|scope| (scope.clone(), self.scope_map(scope)))
            .collect()
    }

    /// Targets that resolve differently depending on scope: either the final
    /// type differs between scopes, or some scopes have no resolution at all.
    pub fn scope_sensitive_targets(&self) -> Vec<&str> {
        self.targets
            .values()
            .filter(|t| {
                let partial = t.scopes.len() < self.scope_order.len();
                let mut finals = t.scopes.values().map(|r| r.final_type.as_str());
                let first = finals.next();
                partial || finals.any(|f| Some(f) != first)
            })
            .map(|t| t.target.as_str())
            .collect()
    }
}

fn to_steps(scope: &str, decls: &[OverrideDeclaration]) -> Vec<ResolutionStep> {
    decls
        .iter()
        .map(|d| ResolutionStep {
            scope: scope.to_string(),
            resolved_type: d.resolved_type.clone(),
            module: d.module.clone(),
            evidence: d.evidence.clone(),
        })
        .collect()
}
