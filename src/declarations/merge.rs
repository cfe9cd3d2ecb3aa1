//! Cross-file merging of plugin and observer declarations
//!
//! Declarations arrive in module load order. Records sharing a key are merged
//! field by field, later values replacing earlier ones. A record in a
//! non-global scope that never names a class inherits it from the global
//! record with the same key, so an area file can disable or reorder a global
//! plugin by name alone.

use super::{ObserverDeclaration, PluginDeclaration};
use crate::errors::{Extraction, Warning};
use crate::models::Evidence;
use serde::Serialize;
use std::collections::BTreeMap;

/// A plugin after merging every declaration of it within one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPlugin {
    pub scope: String,
    pub target: String,
    pub name: String,
    pub plugin_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    pub disabled: bool,
    /// Module whose declaration named the plugin class
    pub module: String,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedObserver {
    pub scope: String,
    pub event: String,
    pub name: String,
    pub instance: String,
    pub disabled: bool,
    pub module: String,
    pub evidence: Evidence,
}

#[derive(Debug, Clone)]
struct Partial {
    class: Option<(String, String, Evidence)>,
    sort_order: Option<i64>,
    disabled: Option<bool>,
    first_evidence: Evidence,
}

impl Partial {
    fn new(evidence: &Evidence) -> Self {
        Self {
            class: None,
            sort_order: None,
            disabled: None,
            first_evidence: evidence.clone(),
        }
    }

    fn apply(
        &mut self,
        class: Option<&String>,
        sort_order: Option<i64>,
        disabled: Option<bool>,
        module: &str,
        evidence: &Evidence,
    ) {
        if let Some(class) = class {
            self.class = Some((class.clone(), module.to_string(), evidence.clone()));
        }
        if sort_order.is_some() {
            self.sort_order = sort_order;
        }
        if disabled.is_some() {
            self.disabled = disabled;
        }
    }
}

/// Key is (scope, owner, name); the global partial with the same (owner, name)
/// fills in a missing class.
fn merge_partials(
    partials: BTreeMap<(String, String, String), Partial>,
    global_scope: &str,
    mut finish: impl FnMut(&(String, String, String), Partial, (String, String, Evidence)),
    mut incomplete: impl FnMut(&(String, String, String), &Partial),
) {
    let globals: BTreeMap<(String, String), Partial> = partials
        .iter()
        .filter(|((scope, _, _), _)| scope == global_scope)
        .map(|((_, owner, name), p)| ((owner.clone(), name.clone()), p.clone()))
        .collect();

    for (key, mut partial) in partials {
        if key.0 != global_scope {
            if let Some(global) = globals.get(&(key.1.clone(), key.2.clone())) {
                if partial.class.is_none() {
                    partial.class = global.class.clone();
                }
                if partial.sort_order.is_none() {
                    partial.sort_order = global.sort_order;
                }
                if partial.disabled.is_none() {
                    partial.disabled = global.disabled;
                }
            }
        }
        match partial.class.clone() {
            Some(class) => finish(&key, partial, class),
            None => incomplete(&key, &partial),
        }
    }
}

/// Merge plugin declarations given in load order with their declaring module.
///
/// Disabled plugins are kept in the result with `disabled = true`.
pub fn merge_plugins<'a>(
    declarations: impl IntoIterator<Item = (&'a str, &'a PluginDeclaration)>,
    global_scope: &str,
) -> Extraction<Vec<MergedPlugin>> {
    let mut partials: BTreeMap<(String, String, String), Partial> = BTreeMap::new();
    for (module, decl) in declarations {
        partials
            .entry((decl.scope.clone(), decl.target.clone(), decl.name.clone()))
            .or_insert_with(|| Partial::new(&decl.evidence))
            .apply(
                decl.plugin_type.as_ref(),
                decl.sort_order,
                decl.disabled,
                module,
                &decl.evidence,
            );
    }

    let mut out = Extraction::new(Vec::new());
    let mut warnings = Vec::new();
    merge_partials(
        partials,
        global_scope,
        |(scope, target, name), partial, (plugin_type, module, evidence)| {
            out.value.push(MergedPlugin {
                scope: scope.clone(),
                target: target.clone(),
                name: name.clone(),
                plugin_type,
                sort_order: partial.sort_order,
                disabled: partial.disabled.unwrap_or(false),
                module,
                evidence,
            });
        },
        |(_, target, name), partial| {
            if partial.disabled != Some(true) {
                warnings.push(Warning::invalid_declaration(
                    partial.first_evidence.source.clone(),
                    format!("plugin {} on {} never declares a 'type'", name, target),
                ));
            }
        },
    );
    for warning in warnings {
        out.warn(warning);
    }
    out
}

/// Merge observer declarations given in load order with their declaring module.
pub fn merge_observers<'a>(
    declarations: impl IntoIterator<Item = (&'a str, &'a ObserverDeclaration)>,
    global_scope: &str,
) -> Extraction<Vec<MergedObserver>> {
    let mut partials: BTreeMap<(String, String, String), Partial> = BTreeMap::new();
    for (module, decl) in declarations {
        partials
            .entry((decl.scope.clone(), decl.event.clone(), decl.name.clone()))
            .or_insert_with(|| Partial::new(&decl.evidence))
            .apply(decl.instance.as_ref(), None, decl.disabled, module, &decl.evidence);
    }

    let mut out = Extraction::new(Vec::new());
    let mut warnings = Vec::new();
    merge_partials(
        partials,
        global_scope,
        |(scope, event, name), partial, (instance, module, evidence)| {
            out.value.push(MergedObserver {
                scope: scope.clone(),
                event: event.clone(),
                name: name.clone(),
                instance,
                disabled: partial.disabled.unwrap_or(false),
                module,
                evidence,
            });
        },
        |(_, event, name), partial| {
            if partial.disabled != Some(true) {
                warnings.push(Warning::invalid_declaration(
                    partial.first_evidence.source.clone(),
                    format!("observer {} of {} never declares an 'instance'", name, event),
                ));
            }
        },
    );
    for warning in warnings {
        out.warn(warning);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(scope: &str, name: &str, ty: Option<&str>, order: Option<i64>, disabled: Option<bool>) -> PluginDeclaration {
        PluginDeclaration {
            scope: scope.into(),
            target: "Acme\\Cart\\Model\\Cart".into(),
            name: name.into(),
            plugin_type: ty.map(String::from),
            sort_order: order,
            disabled,
            evidence: Evidence::declaration(format!("etc/{}/di.xml", scope), Some(1), "<plugin/>", "plugin"),
        }
    }

    #[test]
    fn test_later_declaration_overrides_fields() {
        let first = plugin("global", "audit", Some("Acme\\Audit\\CartPlugin"), Some(10), None);
        let second = plugin("global", "audit", None, Some(30), None);
        let merged = merge_plugins([("Acme_Audit", &first), ("Acme_Tweaks", &second)], "global");
        assert!(merged.warnings.is_empty());
        assert_eq!(merged.value.len(), 1);
        let p = &merged.value[0];
        assert_eq!(p.plugin_type, "Acme\\Audit\\CartPlugin");
        assert_eq!(p.sort_order, Some(30));
        assert_eq!(p.module, "Acme_Audit");
        assert!(!p.disabled);
    }

    #[test]
    fn test_scope_record_inherits_global_class() {
        let global = plugin("global", "audit", Some("Acme\\Audit\\CartPlugin"), Some(10), None);
        let frontend = plugin("frontend", "audit", None, None, Some(true));
        let merged = merge_plugins([("Acme_Audit", &global), ("Acme_Store", &frontend)], "global");
        assert_eq!(merged.value.len(), 2);
        let front = merged.value.iter().find(|p| p.scope == "frontend").unwrap();
        assert!(front.disabled);
        assert_eq!(front.plugin_type, "Acme\\Audit\\CartPlugin");
        assert_eq!(front.sort_order, Some(10));
    }

    #[test]
    fn test_plugin_without_class_warned() {
        let orphan = plugin("global", "ghost", None, Some(5), None);
        let merged = merge_plugins([("Acme_X", &orphan)], "global");
        assert!(merged.value.is_empty());
        assert_eq!(merged.warnings.len(), 1);
    }

    #[test]
    fn test_observer_disabled_elsewhere() {
        let ev = Evidence::declaration("etc/events.xml", Some(2), "<observer/>", "observer");
        let original = ObserverDeclaration {
            scope: "global".into(),
            event: "order_place".into(),
            name: "notify".into(),
            instance: Some("Acme\\Notify\\Observer".into()),
            disabled: None,
            evidence: ev.clone(),
        };
        let disabling = ObserverDeclaration {
            instance: None,
            disabled: Some(true),
            ..original.clone()
        };
        let merged = merge_observers([("Acme_Notify", &original), ("Acme_Quiet", &disabling)], "global");
        assert_eq!(merged.value.len(), 1);
        assert!(merged.value[0].disabled);
        assert_eq!(merged.value[0].module, "Acme_Notify");
    }
}
