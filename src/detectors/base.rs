//! Base detector trait and types
//!
//! This module defines the abstractions shared by the architectural-debt
//! detectors:
//! - `Detector` trait that all detectors implement
//! - `DebtFinding` describing one detected issue
//! - `DetectionSummary` with per-severity counts

use crate::graph::DependencyGraph;
use crate::models::{Evidence, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// One architectural-debt finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtFinding {
    /// Name of the detector that produced this finding
    pub detector: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Modules involved, in a stable order
    pub modules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    pub evidence: Vec<Evidence>,
}

/// Trait for module-graph detectors
///
/// Detectors are pure functions of the dependency graph: they never fail,
/// an empty graph simply yields no findings.
pub trait Detector: Send + Sync {
    /// Unique identifier for this detector (e.g., "CircularDependencyDetector")
    fn name(&self) -> &'static str;

    /// Human-readable description of what this detector finds
    fn description(&self) -> &'static str;

    /// Run detection and return findings
    fn detect(&self, graph: &DependencyGraph) -> Vec<DebtFinding>;
}

/// Summary statistics over a set of findings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub detectors_run: usize,
    pub total_findings: usize,
    /// Findings by severity, keyed by lowercase severity name
    pub by_severity: BTreeMap<Severity, usize>,
    /// Findings by detector name
    pub by_detector: BTreeMap<String, usize>,
}

impl DetectionSummary {
    pub fn from_findings(detectors_run: usize, findings: &[DebtFinding]) -> Self {
        let mut summary = Self {
            detectors_run,
            total_findings: findings.len(),
            ..Default::default()
        };
        for finding in findings {
            *summary.by_severity.entry(finding.severity).or_insert(0) += 1;
            *summary
                .by_detector
                .entry(finding.detector.clone())
                .or_insert(0) += 1;
        }
        summary
    }
}
