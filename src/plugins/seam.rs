//! Plugin seams: every interceptor on one (class, method)
//!
//! Plugins are grouped by the concrete class their declared target resolves
//! to in the plugin's scope, so a plugin declared on an interface and one on
//! its preferred implementation land on the same seam. Within a seam the
//! before/around/after buckets run in ascending `sortOrder` (undeclared last,
//! ties by plugin name) and nest like this:
//!
//! ```text
//! before(10) → before(20) → around(1).pre → around(2).pre → ORIGINAL
//!            → around(2).post → around(1).post → after(5) → after(30)
//! ```

use super::side_effects::{InterceptorKind, SideEffect, SideEffectHeuristics, SideEffectKind};
use super::ClassIndex;
use crate::declarations::MergedPlugin;
use crate::errors::{Extraction, Warning};
use crate::models::{ids, Evidence, Severity};
use crate::resolution::{follow_chain, ResolutionMap, ScopeList};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One interceptor method contributed by one plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interceptor {
    pub plugin: String,
    pub plugin_class: String,
    /// Interceptor method name, e.g. `aroundSave`
    pub method: String,
    pub kind: InterceptorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    pub scope: String,
    pub declared_target: String,
    pub module: String,
    pub side_effects: Vec<SideEffect>,
    pub declaration: Evidence,
    pub source: Evidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ExecutionStep {
    Before { plugin: String },
    AroundPre { plugin: String },
    Original { target: String, method: String },
    AroundPost { plugin: String },
    After { plugin: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.6 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSeam {
    /// Concrete class the plugins attach to after override resolution
    pub target: String,
    pub method: String,
    /// Every type name plugins on this seam were declared against
    pub declared_targets: Vec<String>,
    pub before: Vec<Interceptor>,
    /// Outermost first
    pub around: Vec<Interceptor>,
    pub after: Vec<Interceptor>,
    pub execution_sequence: Vec<ExecutionStep>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl PluginSeam {
    pub fn interceptor_count(&self) -> usize {
        self.before.len() + self.around.len() + self.after.len()
    }

    fn interceptors(&self) -> impl Iterator<Item = &Interceptor> {
        self.before.iter().chain(&self.around).chain(&self.after)
    }
}

/// Ascending priority, undeclared last, then plugin name.
fn sort_bucket(bucket: &mut [Interceptor]) {
    bucket.sort_by(|a, b| {
        let key = |i: &Interceptor| (i.sort_order.is_none(), i.sort_order.unwrap_or(0));
        key(a).cmp(&key(b)).then_with(|| a.plugin.cmp(&b.plugin))
    });
}

pub fn execution_sequence(
    target: &str,
    method: &str,
    before: &[Interceptor],
    around: &[Interceptor],
    after: &[Interceptor],
) -> Vec<ExecutionStep> {
    let mut steps: Vec<ExecutionStep> = before
        .iter()
        .map(|i| ExecutionStep::Before {
            plugin: i.plugin.clone(),
        })
        .collect();
    steps.extend(around.iter().map(|i| ExecutionStep::AroundPre {
        plugin: i.plugin.clone(),
    }));
    steps.push(ExecutionStep::Original {
        target: target.to_string(),
        method: method.to_string(),
    });
    steps.extend(around.iter().rev().map(|i| ExecutionStep::AroundPost {
        plugin: i.plugin.clone(),
    }));
    steps.extend(after.iter().map(|i| ExecutionStep::After {
        plugin: i.plugin.clone(),
    }));
    steps
}

pub fn risk_score(before: &[Interceptor], around: &[Interceptor], after: &[Interceptor]) -> f64 {
    let all = || before.iter().chain(around).chain(after);
    let severities: Vec<Severity> = all()
        .flat_map(|i| i.side_effects.iter().map(|e| e.severity))
        .collect();

    let mut score: f64 = 0.0;
    if around.len() > 1 {
        score += 0.4;
    }
    if !around.is_empty() {
        score += 0.2;
    }
    if severities.contains(&Severity::Critical) {
        score += 0.3;
    }
    score += 0.1 * severities.iter().filter(|s| **s == Severity::High).count() as f64;
    if all().count() > 5 {
        score += 0.2;
    }
    score.clamp(0.0, 1.0)
}

fn names_with(bucket: &[Interceptor], kind: SideEffectKind) -> Vec<&str> {
    bucket
        .iter()
        .filter(|i| i.side_effects.iter().any(|e| e.kind == kind))
        .map(|i| i.plugin.as_str())
        .collect()
}

fn recommendations(seam: &PluginSeam) -> Vec<String> {
    let mut out = Vec::new();
    let signature = format!("{}::{}", seam.target, seam.method);

    for skipping in names_with(&seam.around, SideEffectKind::SkipsWrappedCall) {
        out.push(format!(
            "Around plugin `{}` never calls $proceed, so {} and every inner plugin are skipped. Confirm this is intended.",
            skipping, signature
        ));
    }
    match seam.around.len() {
        0 => {}
        1 => out.push(format!(
            "Around plugin `{}` wraps {}. A before or after plugin is cheaper if it does not need to control execution.",
            seam.around[0].plugin, signature
        )),
        n => out.push(format!(
            "{} around plugins nest on {}. Each adds a stack frame and hides ordering; prefer before/after plugins where the wrapped result is not needed.",
            n, signature
        )),
    }
    let rewriting = names_with(&seam.before, SideEffectKind::ModifiesArguments);
    if !rewriting.is_empty() {
        out.push(format!(
            "Before plugins {} rewrite arguments; later plugins and the original method see the rewritten values.",
            rewriting.join(", ")
        ));
    }
    let replacing = names_with(&seam.after, SideEffectKind::ModifiesReturn);
    if !replacing.is_empty() {
        out.push(format!(
            "After plugins {} replace the return value; give them explicit sortOrder values so the final result is predictable.",
            replacing.join(", ")
        ));
    }
    let mutating: BTreeSet<&str> = seam
        .interceptors()
        .filter(|i| i.side_effects.iter().any(|e| e.kind == SideEffectKind::MutatesState))
        .map(|i| i.plugin.as_str())
        .collect();
    if !mutating.is_empty() {
        out.push(format!(
            "Plugins {} persist or mutate state around {}; check they are safe when the method is called repeatedly.",
            mutating.into_iter().collect::<Vec<_>>().join(", "),
            signature
        ));
    }
    for (label, bucket) in [("before", &seam.before), ("around", &seam.around), ("after", &seam.after)] {
        let unordered: Vec<&str> = bucket
            .iter()
            .filter(|i| i.sort_order.is_none())
            .map(|i| i.plugin.as_str())
            .collect();
        if bucket.len() > 1 && !unordered.is_empty() {
            out.push(format!(
                "{} plugins {} declare no sortOrder and run after the ordered ones by name; declare sortOrder to pin the order.",
                label,
                unordered.join(", ")
            ));
        }
    }
    if seam.interceptor_count() > 5 {
        out.push(format!(
            "{} interceptors on {}; consider consolidating them.",
            seam.interceptor_count(),
            signature
        ));
    }
    out
}

#[derive(Default)]
struct SeamBuilder {
    declared_targets: BTreeSet<String>,
    before: Vec<Interceptor>,
    around: Vec<Interceptor>,
    after: Vec<Interceptor>,
}

/// Build every plugin seam.
///
/// `plugins` are the merged declarations of all scopes. Disabled plugins are
/// skipped. When a plugin name is declared for the same resolved target in
/// several scopes, the global record is kept, otherwise the earliest scope in
/// scope order.
pub fn analyze_seams(
    plugins: &[MergedPlugin],
    classes: &ClassIndex<'_>,
    resolutions: &ResolutionMap,
    scopes: &ScopeList,
    heuristics: &dyn SideEffectHeuristics,
) -> Extraction<Vec<PluginSeam>> {
    let mut out = Extraction::new(Vec::new());
    let scope_maps = resolutions.scope_maps();
    let empty = BTreeMap::new();
    let scope_rank = |scope: &str| scopes.iter().position(|s| s == scope).unwrap_or(usize::MAX);

    // resolved target -> plugin name -> chosen declaration
    let mut by_target: BTreeMap<String, BTreeMap<&str, &MergedPlugin>> = BTreeMap::new();
    let mut declared: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for plugin in plugins.iter().filter(|p| !p.disabled) {
        let declared_target = ids::normalize_type(&plugin.target);
        let map = scope_maps.get(&plugin.scope).unwrap_or(&empty);
        let resolved = follow_chain(&declared_target, map).final_type;
        declared
            .entry(resolved.clone())
            .or_default()
            .insert(declared_target);
        let chosen = by_target.entry(resolved).or_default();
        let keep_existing = chosen
            .get(plugin.name.as_str())
            .is_some_and(|existing| scope_rank(&existing.scope) <= scope_rank(&plugin.scope));
        if !keep_existing {
            chosen.insert(plugin.name.as_str(), plugin);
        }
    }

    let mut seams: BTreeMap<(String, String), SeamBuilder> = BTreeMap::new();
    for (target, chosen) in &by_target {
        for plugin in chosen.values() {
            let plugin_class = ids::normalize_type(&plugin.plugin_type);
            let Some((locator, outline)) = classes.get(&plugin_class) else {
                out.warn(Warning::missing_input(
                    Some(plugin.evidence.source.clone()),
                    format!(
                        "plugin {} ({}) on {}: class not found in scanned sources",
                        plugin.name, plugin_class, plugin.target
                    ),
                ));
                continue;
            };

            let mut contributed = false;
            for method in &outline.methods {
                let Some((kind, intercepted)) = InterceptorKind::from_method_name(&method.name) else {
                    continue;
                };
                contributed = true;
                let interceptor = Interceptor {
                    plugin: plugin.name.clone(),
                    plugin_class: plugin_class.clone(),
                    method: method.name.clone(),
                    kind,
                    sort_order: plugin.sort_order,
                    scope: plugin.scope.clone(),
                    declared_target: ids::normalize_type(&plugin.target),
                    module: plugin.module.clone(),
                    side_effects: heuristics.detect(method, kind),
                    declaration: plugin.evidence.clone(),
                    source: Evidence::at_lines(
                        locator,
                        method.line_start,
                        method.line_end,
                        format!("{} plugin {}", kind.as_str(), ids::method_id(&plugin_class, &method.name)),
                    ),
                };
                let builder = seams.entry((target.clone(), intercepted)).or_default();
                builder.declared_targets.insert(interceptor.declared_target.clone());
                match kind {
                    InterceptorKind::Before => builder.before.push(interceptor),
                    InterceptorKind::Around => builder.around.push(interceptor),
                    InterceptorKind::After => builder.after.push(interceptor),
                }
            }
            if !contributed {
                debug!("Plugin {} ({}) has no interceptor methods", plugin.name, plugin_class);
            }
        }
    }

    for ((target, method), mut builder) in seams {
        sort_bucket(&mut builder.before);
        sort_bucket(&mut builder.around);
        sort_bucket(&mut builder.after);

        let mut declared_targets: BTreeSet<String> = declared.remove(&target).unwrap_or_default();
        declared_targets.extend(builder.declared_targets);

        let execution_sequence =
            execution_sequence(&target, &method, &builder.before, &builder.around, &builder.after);
        let risk_score = risk_score(&builder.before, &builder.around, &builder.after);
        let mut seam = PluginSeam {
            target,
            method,
            declared_targets: declared_targets.into_iter().collect(),
            before: builder.before,
            around: builder.around,
            after: builder.after,
            execution_sequence,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            recommendations: Vec::new(),
        };
        seam.recommendations = recommendations(&seam);
        out.value.push(seam);
    }

    debug!("Reconstructed {} plugin seams", out.value.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::php::parse_source;
    use crate::plugins::RegexHeuristics;
    use crate::resolution::{OverrideDeclaration, OverrideSet};

    fn plugin(scope: &str, target: &str, name: &str, class: &str, sort_order: Option<i64>) -> MergedPlugin {
        MergedPlugin {
            scope: scope.to_string(),
            target: target.to_string(),
            name: name.to_string(),
            plugin_type: class.to_string(),
            sort_order,
            disabled: false,
            module: "Acme_Plugins".to_string(),
            evidence: Evidence::declaration("app/code/Acme/Plugins/etc/di.xml", Some(3), "<plugin/>", "plugin"),
        }
    }

    const PLUGINS_PHP: &str = r#"<?php
namespace Acme\Plugins;

class Early
{
    public function beforeSave($subject, $order)
    {
        return null;
    }
}

class Late
{
    public function beforeSave($subject, $order)
    {
        return null;
    }
}

class Audit
{
    public function afterSave($subject, $result)
    {
        return $result;
    }
}

class Wrap
{
    public function aroundSave($subject, callable $proceed, $order)
    {
        return $proceed($order);
    }
}

class Shortcut
{
    public function aroundSave($subject, callable $proceed, $order)
    {
        return false;
    }
}
"#;

    fn scopes() -> ScopeList {
        ScopeList::new(vec!["global".into(), "frontend".into()], "global")
    }

    fn analyze(plugins: &[MergedPlugin], overrides: &OverrideSet) -> Extraction<Vec<PluginSeam>> {
        let outline = parse_source(PLUGINS_PHP, "app/code/Acme/Plugins/Plugin.php").unwrap();
        let classes = ClassIndex::build([&outline]);
        let resolutions = ResolutionMap::build(overrides, &scopes());
        analyze_seams(plugins, &classes, &resolutions, &scopes(), &RegexHeuristics)
    }

    fn plugin_names(steps: &[ExecutionStep]) -> Vec<String> {
        steps
            .iter()
            .map(|s| match s {
                ExecutionStep::Before { plugin } => format!("before:{}", plugin),
                ExecutionStep::AroundPre { plugin } => format!("pre:{}", plugin),
                ExecutionStep::Original { .. } => "original".to_string(),
                ExecutionStep::AroundPost { plugin } => format!("post:{}", plugin),
                ExecutionStep::After { plugin } => format!("after:{}", plugin),
            })
            .collect()
    }

    #[test]
    fn test_priority_order() {
        let plugins = vec![
            plugin("global", "Acme\\Sales\\Order", "late", "Acme\\Plugins\\Late", Some(20)),
            plugin("global", "Acme\\Sales\\Order", "early", "Acme\\Plugins\\Early", Some(10)),
            plugin("global", "Acme\\Sales\\Order", "audit", "Acme\\Plugins\\Audit", Some(5)),
        ];
        let result = analyze(&plugins, &OverrideSet::new());
        assert!(result.warnings.is_empty());
        let seam = &result.value[0];
        assert_eq!(seam.method, "save");
        assert_eq!(
            plugin_names(&seam.execution_sequence),
            vec!["before:early", "before:late", "original", "after:audit"]
        );
        assert_eq!(seam.risk_level, RiskLevel::Low);
        assert_eq!(seam.risk_score, 0.0);
    }

    #[test]
    fn test_around_nesting_and_risk() {
        let plugins = vec![
            plugin("global", "Acme\\Sales\\Order", "inner", "Acme\\Plugins\\Shortcut", Some(20)),
            plugin("global", "Acme\\Sales\\Order", "outer", "Acme\\Plugins\\Wrap", Some(10)),
            plugin("global", "Acme\\Sales\\Order", "unordered", "Acme\\Plugins\\Audit", None),
        ];
        let seam = &analyze(&plugins, &OverrideSet::new()).value[0];
        assert_eq!(
            plugin_names(&seam.execution_sequence),
            vec!["pre:outer", "pre:inner", "original", "post:inner", "post:outer", "after:unordered"]
        );
        // two arounds (+0.4 +0.2), one critical skip (+0.3)
        assert!((seam.risk_score - 0.9).abs() < 1e-9);
        assert_eq!(seam.risk_level, RiskLevel::High);
        assert!(seam.recommendations.iter().any(|r| r.contains("never calls $proceed")));
    }

    #[test]
    fn test_interface_and_implementation_share_seam() {
        let mut overrides = OverrideSet::new();
        overrides.push(
            "Acme\\Sales\\Api\\OrderInterface",
            "global",
            OverrideDeclaration {
                resolved_type: "Acme\\Sales\\Order".to_string(),
                module: "Acme_Sales".to_string(),
                evidence: Evidence::declaration("di.xml", Some(1), "<preference/>", "preference"),
            },
        );
        let plugins = vec![
            plugin("global", "Acme\\Sales\\Api\\OrderInterface", "early", "Acme\\Plugins\\Early", Some(10)),
            plugin("global", "Acme\\Sales\\Order", "audit", "Acme\\Plugins\\Audit", None),
        ];
        let seams = analyze(&plugins, &overrides).value;
        assert_eq!(seams.len(), 1);
        assert_eq!(seams[0].target, "Acme\\Sales\\Order");
        assert_eq!(
            seams[0].declared_targets,
            vec!["Acme\\Sales\\Api\\OrderInterface", "Acme\\Sales\\Order"]
        );
    }

    #[test]
    fn test_disabled_missing_and_duplicate_plugins() {
        let mut disabled = plugin("global", "Acme\\Sales\\Order", "wrap", "Acme\\Plugins\\Wrap", None);
        disabled.disabled = true;
        let plugins = vec![
            disabled,
            plugin("global", "Acme\\Sales\\Order", "ghost", "Acme\\Plugins\\Missing", None),
            plugin("frontend", "Acme\\Sales\\Order", "audit", "Acme\\Plugins\\Audit", Some(99)),
            plugin("global", "Acme\\Sales\\Order", "audit", "Acme\\Plugins\\Audit", Some(1)),
        ];
        let result = analyze(&plugins, &OverrideSet::new());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, crate::errors::WarningKind::MissingInput);

        let seam = &result.value[0];
        assert!(seam.around.is_empty());
        assert_eq!(seam.after.len(), 1);
        assert_eq!(seam.after[0].scope, "global");
        assert_eq!(seam.after[0].sort_order, Some(1));
    }
}
