//! `events.xml`: event observers

use super::{attr, bool_attr, children_named, element_evidence, missing, parse_xml};
use super::{Declaration, ObserverDeclaration};
use crate::errors::Extraction;
use crate::models::ids;

pub fn parse_events(content: &str, locator: &str, scope: &str) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let doc = match parse_xml(content, locator) {
        Ok(doc) => doc,
        Err(warning) => {
            out.warn(warning);
            return out;
        }
    };

    for event in children_named(doc.root_element(), "event") {
        let Some(event_name) = attr(event, "name") else {
            out.warn(missing(&doc, event, locator, "'name'"));
            continue;
        };
        for observer in children_named(event, "observer") {
            let Some(name) = attr(observer, "name") else {
                out.warn(missing(&doc, observer, locator, "'name'"));
                continue;
            };
            let instance = attr(observer, "instance").map(ids::normalize_type);
            let disabled = bool_attr(observer, "disabled");
            if instance.is_none() && disabled.is_none() {
                out.warn(missing(&doc, observer, locator, "'instance'"));
                continue;
            }
            out.value.push(Declaration::Observer(ObserverDeclaration {
                scope: scope.to_string(),
                event: event_name.to_string(),
                name: name.to_string(),
                instance,
                disabled,
                evidence: element_evidence(&doc, observer, locator, format!("observer of {}", event_name)),
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observers() {
        let xml = r#"<config>
    <event name="sales_order_place_after">
        <observer name="acme_notify" instance="Acme\Notify\Observer\OrderPlaced"/>
        <observer name="vendor_sync" disabled="true"/>
        <observer name="broken"/>
    </event>
    <event>
        <observer name="orphan" instance="Acme\X"/>
    </event>
</config>"#;
        let result = parse_events(xml, "etc/frontend/events.xml", "frontend");
        assert_eq!(result.value.len(), 2);
        assert_eq!(result.warnings.len(), 2);

        match &result.value[0] {
            Declaration::Observer(o) => {
                assert_eq!(o.event, "sales_order_place_after");
                assert_eq!(o.instance.as_deref(), Some("Acme\\Notify\\Observer\\OrderPlaced"));
                assert_eq!(o.scope, "frontend");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &result.value[1] {
            Declaration::Observer(o) => assert_eq!(o.disabled, Some(true)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
