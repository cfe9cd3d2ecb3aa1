//! `di.xml`: preferences, virtual types, plugins and object arguments

use super::{
    attr, bool_attr, children_named, element_evidence, is_element, missing, parse_xml,
    Declaration, ObjectArgument, PluginDeclaration, Preference, VirtualType,
};
use crate::errors::Extraction;
use crate::models::ids;

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub fn parse_di(content: &str, locator: &str, scope: &str) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let doc = match parse_xml(content, locator) {
        Ok(doc) => doc,
        Err(warning) => {
            out.warn(warning);
            return out;
        }
    };

    for node in doc.root_element().children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "preference" => match (attr(node, "for"), attr(node, "type")) {
                (Some(target), Some(implementation)) => {
                    out.value.push(Declaration::Preference(Preference {
                        scope: scope.to_string(),
                        target: ids::normalize_type(target),
                        implementation: ids::normalize_type(implementation),
                        evidence: element_evidence(&doc, node, locator, "preference"),
                    }));
                }
                _ => out.warn(missing(&doc, node, locator, "'for' or 'type'")),
            },
            "virtualType" => {
                let Some(name) = attr(node, "name") else {
                    out.warn(missing(&doc, node, locator, "'name'"));
                    continue;
                };
                let name = ids::normalize_type(name);
                match attr(node, "type") {
                    Some(base) => out.value.push(Declaration::VirtualType(VirtualType {
                        scope: scope.to_string(),
                        name: name.clone(),
                        base_type: ids::normalize_type(base),
                        evidence: element_evidence(&doc, node, locator, "virtual type"),
                    })),
                    None => out.warn(missing(&doc, node, locator, "'type'")),
                }
                type_children(&doc, node, &name, locator, scope, &mut out);
            }
            "type" => {
                let Some(name) = attr(node, "name") else {
                    out.warn(missing(&doc, node, locator, "'name'"));
                    continue;
                };
                let name = ids::normalize_type(name);
                type_children(&doc, node, &name, locator, scope, &mut out);
            }
            _ => {}
        }
    }
    out
}

/// Plugins and object arguments configured under a `<type>` or `<virtualType>`.
fn type_children(
    doc: &roxmltree::Document,
    node: roxmltree::Node,
    target: &str,
    locator: &str,
    scope: &str,
    out: &mut Extraction<Vec<Declaration>>,
) {
    for plugin in children_named(node, "plugin") {
        let Some(name) = attr(plugin, "name") else {
            out.warn(missing(doc, plugin, locator, "'name'"));
            continue;
        };
        let sort_order = match attr(plugin, "sortOrder").map(str::parse::<i64>) {
            Some(Ok(v)) => Some(v),
            Some(Err(_)) => {
                out.warn(missing(doc, plugin, locator, "a numeric 'sortOrder'"));
                None
            }
            None => None,
        };
        out.value.push(Declaration::Plugin(PluginDeclaration {
            scope: scope.to_string(),
            target: target.to_string(),
            name: name.to_string(),
            plugin_type: attr(plugin, "type").map(ids::normalize_type),
            sort_order,
            disabled: bool_attr(plugin, "disabled"),
            evidence: element_evidence(doc, plugin, locator, "plugin"),
        }));
    }

    for arguments in children_named(node, "arguments") {
        for arg in children_named(arguments, "argument") {
            let arg_name = attr(arg, "name").unwrap_or_default();
            for value in std::iter::once(arg).chain(arg.descendants().filter(|d| is_element(d, "item"))) {
                if !is_object(value) {
                    continue;
                }
                let Some(text) = value.text().map(str::trim).filter(|t| !t.is_empty()) else {
                    out.warn(missing(doc, value, locator, "an object class name"));
                    continue;
                };
                out.value.push(Declaration::Argument(ObjectArgument {
                    scope: scope.to_string(),
                    target: target.to_string(),
                    argument: arg_name.to_string(),
                    value_type: ids::normalize_type(text),
                    evidence: element_evidence(doc, value, locator, "object argument"),
                }));
            }
        }
    }
}

fn is_object(node: roxmltree::Node) -> bool {
    node.attribute((XSI_NS, "type"))
        .or_else(|| node.attribute("type"))
        .map(|t| t.trim() == "object")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WarningKind;

    const DI: &str = r#"<?xml version="1.0"?>
<config xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <preference for="\Acme\Cart\Api\CartInterface" type="Acme\Cart\Model\Cart"/>
    <preference for="Acme\Cart\Api\TotalsInterface"/>
    <virtualType name="Acme\Cart\Model\VirtualCart" type="Acme\Cart\Model\Cart">
        <arguments>
            <argument name="logger" xsi:type="object">Acme\Log\Logger</argument>
        </arguments>
    </virtualType>
    <type name="Acme\Cart\Model\Cart">
        <plugin name="acme_cart_audit" type="Acme\Audit\Plugin\CartPlugin" sortOrder="20"/>
        <plugin name="legacy_plugin" disabled="true"/>
        <arguments>
            <argument name="pool" xsi:type="array">
                <item name="first" xsi:type="object">Acme\Cart\Model\First</item>
                <item name="label" xsi:type="string">not a class</item>
            </argument>
        </arguments>
    </type>
</config>
"#;

    #[test]
    fn test_parse_di_records() {
        let result = parse_di(DI, "app/code/Acme/Cart/etc/di.xml", "global");

        let prefs: Vec<_> = result
            .value
            .iter()
            .filter_map(|d| match d {
                Declaration::Preference(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].target, "Acme\\Cart\\Api\\CartInterface");
        assert_eq!(prefs[0].evidence.line_start, Some(3));

        let virtual_types = result
            .value
            .iter()
            .filter(|d| matches!(d, Declaration::VirtualType(_)))
            .count();
        assert_eq!(virtual_types, 1);

        let plugins: Vec<_> = result
            .value
            .iter()
            .filter_map(|d| match d {
                Declaration::Plugin(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].sort_order, Some(20));
        assert_eq!(plugins[1].plugin_type, None);
        assert_eq!(plugins[1].disabled, Some(true));

        let args: Vec<_> = result
            .value
            .iter()
            .filter_map(|d| match d {
                Declaration::Argument(a) => Some(a.value_type.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(args, vec!["Acme\\Log\\Logger", "Acme\\Cart\\Model\\First"]);
    }

    #[test]
    fn test_incomplete_preference_warned() {
        let result = parse_di(DI, "etc/di.xml", "global");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::InvalidDeclaration);
    }

    #[test]
    fn test_scope_is_attached() {
        let result = parse_di(DI, "etc/graphql/di.xml", "graphql");
        assert!(result.value.iter().all(|d| match d {
            Declaration::Preference(p) => p.scope == "graphql",
            Declaration::Plugin(p) => p.scope == "graphql",
            _ => true,
        }));
    }
}
