//! Resolve command - show one override target's resolution in every scope

use super::Invocation;
use crate::models::ids;
use crate::pipeline::run_analysis;
use crate::reporters::OutputFormat;
use crate::resolution::{follow_chain, ChainWalk, ResolutionMap, ScopeResolution};
use anyhow::{bail, Result};
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// How one target resolves, for display.
#[derive(Debug, Serialize)]
struct TargetView<'a> {
    target: String,
    scope: String,
    /// Declared steps per scope (absent scopes have no declaration)
    scopes: BTreeMap<&'a str, &'a ScopeResolution>,
    final_type: String,
    chain: Vec<String>,
    self_referential: bool,
    /// Scopes whose chain ends somewhere else, with that type
    divergences: BTreeMap<String, String>,
}

fn build_view<'a>(map: &'a ResolutionMap, target: &str, scope: &str) -> TargetView<'a> {
    let target = ids::normalize_type(target);
    let scopes = map
        .targets
        .get(&target)
        .map(|t| t.scopes.iter().map(|(s, r)| (s.as_str(), r)).collect())
        .unwrap_or_default();

    let walk = |scope: &str| -> ChainWalk { follow_chain(&target, &map.scope_map(scope)) };
    let primary = walk(scope);
    let divergences = map
        .scope_order
        .iter()
        .filter(|s| s.as_str() != scope)
        .filter_map(|s| {
            let other = walk(s);
            (other.final_type != primary.final_type).then(|| (s.clone(), other.final_type))
        })
        .collect();

    let mut chain = vec![target.clone()];
    chain.extend(primary.steps.iter().map(|step| step.to.clone()));
    TargetView {
        scope: scope.to_string(),
        scopes,
        final_type: primary.final_type,
        chain,
        self_referential: primary.self_referential,
        divergences,
        target,
    }
}

fn render_text(view: &TargetView) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "\n{} {}", style("Target").bold(), style(&view.target).cyan())?;
    if view.scopes.is_empty() {
        writeln!(out, "  {}", style("no override declarations").dim())?;
    }
    for (scope, resolution) in &view.scopes {
        writeln!(
            out,
            "\n  {} → {} {}",
            style(scope).bold(),
            style(&resolution.final_type).green(),
            style(format!("(confidence {:.2})", resolution.confidence)).dim()
        )?;
        for step in &resolution.steps {
            writeln!(
                out,
                "    {} {} {}",
                style(&step.scope).dim(),
                step.resolved_type,
                style(format!("[{} @ {}]", step.module, step.evidence.source)).dim()
            )?;
        }
    }

    writeln!(out, "\n{} ({})", style("Delegation").bold(), view.scope)?;
    writeln!(out, "  {}", view.chain.join(" → "))?;
    if view.self_referential {
        writeln!(out, "  {}", style("chain revisits a type; stopped").yellow())?;
    }
    for (scope, final_type) in &view.divergences {
        writeln!(out, "  {} {}: {}", style("≠").yellow(), scope, final_type)?;
    }
    Ok(out)
}

pub(super) fn run(invocation: &Invocation, target: &str, scope: Option<&str>) -> Result<()> {
    let report = run_analysis(&invocation.root, &invocation.config, &invocation.options)?;
    let map = &report.resolutions;
    let scope = scope.unwrap_or(map.global_scope.as_str());
    if !map.scope_order.iter().any(|s| s == scope) {
        bail!(
            "Unknown scope '{}'. Configured scopes: {}",
            scope,
            map.scope_order.join(", ")
        );
    }

    let view = build_view(map, target, scope);
    match invocation.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => print!("{}", render_text(&view)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Evidence;
    use crate::resolution::{OverrideDeclaration, OverrideSet, ScopeList};

    fn decl(resolved: &str) -> OverrideDeclaration {
        OverrideDeclaration {
            resolved_type: resolved.to_string(),
            module: "Acme_Core".to_string(),
            evidence: Evidence::declaration("etc/di.xml", Some(2), "<preference/>", "preference"),
        }
    }

    fn map() -> ResolutionMap {
        let mut overrides = OverrideSet::new();
        overrides.push("Acme\\Api\\AInterface", "global", decl("Acme\\X"));
        overrides.push("Acme\\Api\\AInterface", "graphql", decl("Acme\\Y"));
        overrides.push("Acme\\Y", "graphql", decl("Acme\\Z"));
        let scopes = ScopeList::new(
            vec!["global".to_string(), "frontend".to_string(), "graphql".to_string()],
            "global",
        );
        ResolutionMap::build(&overrides, &scopes)
    }

    #[test]
    fn test_view_follows_chain_and_reports_divergence() {
        let map = map();
        let view = build_view(&map, "\\Acme\\Api\\AInterface", "graphql");
        assert_eq!(view.target, "Acme\\Api\\AInterface");
        assert_eq!(view.final_type, "Acme\\Z");
        assert_eq!(view.chain, vec!["Acme\\Api\\AInterface", "Acme\\Y", "Acme\\Z"]);
        assert_eq!(view.divergences.get("frontend").map(String::as_str), Some("Acme\\X"));
        assert_eq!(view.divergences.get("global").map(String::as_str), Some("Acme\\X"));
        assert_eq!(view.scopes.len(), 3);
    }

    #[test]
    fn test_text_for_unknown_target() {
        console::set_colors_enabled(false);
        let map = map();
        let view = build_view(&map, "Acme\\Nothing", "global");
        let text = render_text(&view).unwrap();
        assert!(text.contains("no override declarations"));
        assert!(view.divergences.is_empty());
    }
}
