//! JSON documents
//!
//! One pretty-printed document per concern. Every collection is already in
//! canonical order when it reaches this module and no timestamps or absolute
//! paths are added, so two runs over the same tree write identical bytes.

use crate::detectors::ArchitecturalDebt;
use crate::errors::{ModgraphResult, Warning, WarningKind};
use crate::graph::{EdgeSubset, EdgeType, ModuleEdge};
use crate::modules::Module;
use crate::pipeline::{AnalysisReport, ScanStats};
use crate::plugins::{PluginSeam, RiskLevel};
use crate::resolution::{DelegationChain, ResolutionTarget};
use crate::scoring::{CouplingReport, HotspotReport};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct GraphSummary {
    pub modules: usize,
    pub edges: usize,
    /// Sum of edge weights
    pub occurrences: usize,
    pub by_type: BTreeMap<EdgeType, usize>,
    pub by_subset: BTreeMap<EdgeSubset, usize>,
}

#[derive(Serialize)]
pub struct GraphDocument<'a> {
    pub summary: GraphSummary,
    pub scan: &'a ScanStats,
    pub modules: Vec<&'a Module>,
    pub load_order: &'a [String],
    pub edges: &'a [ModuleEdge],
    pub coupling: &'a CouplingReport,
}

#[derive(Serialize)]
pub struct ResolutionsDocument<'a> {
    pub global_scope: &'a str,
    pub scope_order: &'a [String],
    pub total_targets: usize,
    /// Targets whose final type depends on the scope
    pub scope_sensitive: Vec<&'a str>,
    pub targets: Vec<&'a ResolutionTarget>,
}

#[derive(Serialize)]
pub struct DelegationDocument<'a> {
    pub total: usize,
    pub divergent: usize,
    pub self_referential: usize,
    pub chains: &'a [DelegationChain],
}

#[derive(Serialize)]
pub struct SeamsDocument<'a> {
    pub total: usize,
    pub interceptors: usize,
    pub by_risk_level: BTreeMap<RiskLevel, usize>,
    pub seams: &'a [PluginSeam],
}

#[derive(Serialize)]
pub struct WarningsDocument<'a> {
    pub total: usize,
    pub by_kind: BTreeMap<WarningKind, usize>,
    pub warnings: &'a [Warning],
}

pub fn graph_document(report: &AnalysisReport) -> GraphDocument<'_> {
    let graph = &report.graph;
    GraphDocument {
        summary: GraphSummary {
            modules: graph.modules.len(),
            edges: graph.edges.len(),
            occurrences: graph.edges.iter().map(|e| e.weight).sum(),
            by_type: graph.counts_by_type(),
            by_subset: graph.counts_by_subset(),
        },
        scan: &report.stats,
        modules: report.modules.modules().collect(),
        load_order: &report.load_order,
        edges: &graph.edges,
        coupling: &report.coupling,
    }
}

pub fn resolutions_document(report: &AnalysisReport) -> ResolutionsDocument<'_> {
    let map = &report.resolutions;
    ResolutionsDocument {
        global_scope: &map.global_scope,
        scope_order: &map.scope_order,
        total_targets: map.targets.len(),
        scope_sensitive: map.scope_sensitive_targets(),
        targets: map.targets.values().collect(),
    }
}

pub fn delegation_document(report: &AnalysisReport) -> DelegationDocument<'_> {
    let chains = &report.delegation_chains;
    DelegationDocument {
        total: chains.len(),
        divergent: chains.iter().filter(|c| !c.divergences.is_empty()).count(),
        self_referential: chains.iter().filter(|c| c.self_referential).count(),
        chains,
    }
}

pub fn seams_document(report: &AnalysisReport) -> SeamsDocument<'_> {
    let seams = &report.plugin_seams;
    let mut by_risk_level = BTreeMap::new();
    for seam in seams {
        *by_risk_level.entry(seam.risk_level).or_insert(0) += 1;
    }
    SeamsDocument {
        total: seams.len(),
        interceptors: seams.iter().map(PluginSeam::interceptor_count).sum(),
        by_risk_level,
        seams,
    }
}

pub fn warnings_document(warnings: &[Warning]) -> WarningsDocument<'_> {
    let mut by_kind = BTreeMap::new();
    for warning in warnings {
        *by_kind.entry(warning.kind).or_insert(0) += 1;
    }
    WarningsDocument {
        total: warnings.len(),
        by_kind,
        warnings,
    }
}

/// The documents written by `analyze`, as (file name, pretty JSON).
pub fn render_documents(report: &AnalysisReport) -> ModgraphResult<Vec<(&'static str, String)>> {
    let debt: &ArchitecturalDebt = &report.debt;
    let hotspots: &HotspotReport = &report.hotspots;
    Ok(vec![
        ("graph.json", pretty(&graph_document(report))?),
        ("resolutions.json", pretty(&resolutions_document(report))?),
        ("delegation_chains.json", pretty(&delegation_document(report))?),
        ("plugin_seams.json", pretty(&seams_document(report))?),
        ("architectural_debt.json", pretty(debt)?),
        ("hotspots.json", pretty(hotspots)?),
        ("warnings.json", pretty(&warnings_document(&report.warnings))?),
    ])
}

/// Compact machine-readable run summary for `--format json`.
pub fn render_summary(report: &AnalysisReport) -> Result<String> {
    #[derive(Serialize)]
    struct Summary<'a> {
        graph: GraphSummary,
        scan: &'a ScanStats,
        resolution_targets: usize,
        scope_sensitive_targets: usize,
        delegation_chains: usize,
        plugin_seams: usize,
        cycles: usize,
        debt_findings: usize,
        high_risk_hotspots: usize,
        warnings: BTreeMap<WarningKind, usize>,
    }

    let graph = graph_document(report).summary;
    let summary = Summary {
        graph,
        scan: &report.stats,
        resolution_targets: report.resolutions.targets.len(),
        scope_sensitive_targets: report.resolutions.scope_sensitive_targets().len(),
        delegation_chains: report.delegation_chains.len(),
        plugin_seams: report.plugin_seams.len(),
        cycles: report.debt.cycles.len(),
        debt_findings: report.debt.findings.len(),
        high_risk_hotspots: report.hotspots.high_risk_count,
        warnings: warnings_document(&report.warnings).by_kind,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> ModgraphResult<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}
