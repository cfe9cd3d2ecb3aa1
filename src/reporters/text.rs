//! Text (terminal) summary with colors

use crate::models::Severity;
use crate::pipeline::AnalysisReport;
use crate::plugins::RiskLevel;
use anyhow::Result;
use console::style;
use std::fmt::Write as _;

const TOP: usize = 5;

fn severity_tag(severity: Severity) -> String {
    match severity {
        Severity::Critical => style("[C]").red().bold().to_string(),
        Severity::High => style("[H]").red().to_string(),
        Severity::Medium => style("[M]").yellow().to_string(),
        Severity::Low => style("[L]").blue().to_string(),
    }
}

fn risk_tag(level: RiskLevel) -> String {
    match level {
        RiskLevel::High => style("high").red().to_string(),
        RiskLevel::Medium => style("medium").yellow().to_string(),
        RiskLevel::Low => style("low").green().to_string(),
    }
}

/// Render the run summary as formatted terminal output
pub fn render(report: &AnalysisReport) -> Result<String> {
    let mut out = String::new();
    let graph = &report.graph;

    writeln!(out, "\n{}", style("modgraph analysis").bold())?;
    writeln!(out, "{}", style("──────────────────────────────────────").dim())?;
    writeln!(
        out,
        "Modules: {}  Edges: {}  Sources: {}  Declarations: {}\n",
        style(graph.modules.len()).cyan(),
        style(graph.edges.len()).cyan(),
        report.stats.parsed_files,
        report.stats.declarations
    )?;

    // Edge subsets
    writeln!(out, "{}", style("EDGES").bold())?;
    let by_subset = graph.counts_by_subset();
    let parts: Vec<String> = by_subset
        .iter()
        .map(|(subset, count)| format!("{}: {}", subset.as_str(), count))
        .collect();
    if parts.is_empty() {
        writeln!(out, "  {}", style("none").dim())?;
    } else {
        writeln!(out, "  {}", parts.join("  "))?;
    }
    let composite = &report.coupling.composite;
    if let Some(avg) = composite.average_instability {
        writeln!(out, "  Average instability: {:.2}", avg)?;
    }
    out.push('\n');

    // Overrides
    let sensitive = report.resolutions.scope_sensitive_targets();
    writeln!(out, "{}", style("OVERRIDES").bold())?;
    writeln!(
        out,
        "  {} targets, {} scope-sensitive, {} delegation chains ({} diverge)\n",
        report.resolutions.targets.len(),
        sensitive.len(),
        report.delegation_chains.len(),
        report
            .delegation_chains
            .iter()
            .filter(|c| !c.divergences.is_empty())
            .count()
    )?;

    // Plugin seams
    writeln!(out, "{} ({})", style("PLUGIN SEAMS").bold(), report.plugin_seams.len())?;
    let mut seams: Vec<_> = report.plugin_seams.iter().collect();
    seams.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    for seam in seams.iter().take(TOP) {
        writeln!(
            out,
            "  {:<6} {:.2}  {}::{} ({} interceptors)",
            risk_tag(seam.risk_level),
            seam.risk_score,
            seam.target,
            seam.method,
            seam.interceptor_count()
        )?;
    }
    out.push('\n');

    // Debt
    let debt = &report.debt;
    writeln!(
        out,
        "{} ({} findings, {} cycles)",
        style("ARCHITECTURAL DEBT").bold(),
        debt.findings.len(),
        debt.cycles.len()
    )?;
    for finding in debt.findings.iter().take(TOP) {
        writeln!(out, "  {} {}", severity_tag(finding.severity), finding.title)?;
    }
    if debt.findings.len() > TOP {
        writeln!(out, "  {}", style(format!("... and {} more", debt.findings.len() - TOP)).dim())?;
    }
    out.push('\n');

    // Hotspots
    let hotspots = &report.hotspots;
    writeln!(out, "{}", style("HOTSPOTS").bold())?;
    if !hotspots.change_signal_available {
        writeln!(out, "  {}", style("change history unavailable; ranked by centrality only").dim())?;
    }
    for hotspot in hotspots.hotspots.iter().take(TOP) {
        let marker = if hotspot.high_risk {
            style("!").red().bold().to_string()
        } else {
            " ".to_string()
        };
        writeln!(
            out,
            "  {} {:.2}  {} ({} commits, centrality {:.1})",
            marker, hotspot.score, hotspot.module, hotspot.change_frequency, hotspot.centrality
        )?;
    }

    if !report.warnings.is_empty() {
        writeln!(
            out,
            "\n{} {} warnings (see warnings.json)",
            style("⚠").yellow(),
            report.warnings.len()
        )?;
    }

    Ok(out)
}
