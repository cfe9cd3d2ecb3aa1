//! Seams command - list plugin seams with execution order and risk

use super::Invocation;
use crate::pipeline::run_analysis;
use crate::plugins::{ExecutionStep, PluginSeam, RiskLevel};
use crate::reporters::OutputFormat;
use anyhow::Result;
use console::style;
use std::fmt::Write as _;

fn parse_risk(level: &str) -> RiskLevel {
    match level {
        "high" => RiskLevel::High,
        "medium" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Seams at or above `min`, riskiest first (ties keep document order).
fn select(seams: &[PluginSeam], min: RiskLevel) -> Vec<&PluginSeam> {
    let mut selected: Vec<&PluginSeam> = seams.iter().filter(|s| s.risk_level >= min).collect();
    selected.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    selected
}

fn describe_step(step: &ExecutionStep) -> String {
    match step {
        ExecutionStep::Before { plugin } => format!("before  {}", plugin),
        ExecutionStep::AroundPre { plugin } => format!("around▸ {}", plugin),
        ExecutionStep::Original { target, method } => {
            style(format!("ORIGINAL {}::{}", target, method)).bold().to_string()
        }
        ExecutionStep::AroundPost { plugin } => format!("around◂ {}", plugin),
        ExecutionStep::After { plugin } => format!("after   {}", plugin),
    }
}

fn render_text(seams: &[&PluginSeam]) -> Result<String> {
    let mut out = String::new();
    if seams.is_empty() {
        writeln!(out, "\n{}", style("No plugin seams at this risk level").dim())?;
        return Ok(out);
    }

    for seam in seams {
        let level = match seam.risk_level {
            RiskLevel::High => style("HIGH").red().bold(),
            RiskLevel::Medium => style("MEDIUM").yellow(),
            RiskLevel::Low => style("LOW").green(),
        };
        writeln!(
            out,
            "\n{} {}::{}  {} {:.2}",
            style("◆").cyan(),
            style(&seam.target).bold(),
            seam.method,
            level,
            seam.risk_score
        )?;
        for (i, step) in seam.execution_sequence.iter().enumerate() {
            writeln!(out, "  {:>2}. {}", i + 1, describe_step(step))?;
        }
        for interceptor in seam.before.iter().chain(&seam.around).chain(&seam.after) {
            for effect in &interceptor.side_effects {
                writeln!(
                    out,
                    "      {} {}: {}",
                    style(format!("[{}]", effect.severity)).yellow(),
                    interceptor.plugin,
                    effect.description
                )?;
            }
        }
        for recommendation in &seam.recommendations {
            writeln!(out, "  {} {}", style("→").dim(), recommendation)?;
        }
    }
    Ok(out)
}

pub(super) fn run(invocation: &Invocation, min_risk: Option<&str>) -> Result<()> {
    let report = run_analysis(&invocation.root, &invocation.config, &invocation.options)?;
    let min = min_risk.map(parse_risk).unwrap_or(RiskLevel::Low);
    let seams = select(&report.plugin_seams, min);

    match invocation.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&seams)?),
        OutputFormat::Text => print!("{}", render_text(&seams)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seam(target: &str, score: f64) -> PluginSeam {
        PluginSeam {
            target: target.to_string(),
            method: "save".to_string(),
            declared_targets: vec![target.to_string()],
            before: Vec::new(),
            around: Vec::new(),
            after: Vec::new(),
            execution_sequence: vec![ExecutionStep::Original {
                target: target.to_string(),
                method: "save".to_string(),
            }],
            risk_score: score,
            risk_level: RiskLevel::from_score(score),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_select_filters_and_ranks() {
        let seams = vec![seam("A", 0.2), seam("B", 0.9), seam("C", 0.4)];
        let selected: Vec<&str> = select(&seams, parse_risk("medium"))
            .iter()
            .map(|s| s.target.as_str())
            .collect();
        assert_eq!(selected, vec!["B", "C"]);
        assert_eq!(select(&seams, RiskLevel::Low).len(), 3);
    }

    #[test]
    fn test_render_lists_sequence() {
        console::set_colors_enabled(false);
        let seams = vec![seam("Acme\\Cart", 0.0)];
        let text = render_text(&select(&seams, RiskLevel::Low)).unwrap();
        assert!(text.contains("ORIGINAL Acme\\Cart::save"));
        assert!(text.contains("LOW"));
    }
}
