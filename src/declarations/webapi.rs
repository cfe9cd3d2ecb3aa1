//! `webapi.xml`: service routes, used as delegation entry points

use super::{attr, children_named, element_evidence, missing, parse_xml};
use super::{Declaration, RouteDeclaration};
use crate::errors::Extraction;
use crate::models::ids;

pub fn parse_webapi(content: &str, locator: &str) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let doc = match parse_xml(content, locator) {
        Ok(doc) => doc,
        Err(warning) => {
            out.warn(warning);
            return out;
        }
    };

    for route in children_named(doc.root_element(), "route") {
        let (Some(url), Some(method)) = (attr(route, "url"), attr(route, "method")) else {
            out.warn(missing(&doc, route, locator, "'url' or 'method'"));
            continue;
        };
        let Some(service) = children_named(route, "service").next() else {
            out.warn(missing(&doc, route, locator, "a <service> element"));
            continue;
        };
        match (attr(service, "class"), attr(service, "method")) {
            (Some(class), Some(service_method)) => {
                out.value.push(Declaration::Route(RouteDeclaration {
                    url: url.to_string(),
                    http_method: method.to_ascii_uppercase(),
                    service_class: ids::normalize_type(class),
                    service_method: service_method.to_string(),
                    evidence: element_evidence(&doc, route, locator, "webapi route"),
                }));
            }
            _ => out.warn(missing(&doc, service, locator, "'class' or 'method'")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        let xml = r#"<routes>
    <route url="/V1/carts/mine" method="get">
        <service class="Acme\Cart\Api\CartManagementInterface" method="getCartForCustomer"/>
        <resources><resource ref="self"/></resources>
    </route>
    <route url="/V1/broken" method="POST"/>
</routes>"#;
        let result = parse_webapi(xml, "etc/webapi.xml");
        assert_eq!(result.value.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        match &result.value[0] {
            Declaration::Route(r) => {
                assert_eq!(r.http_method, "GET");
                assert_eq!(r.service_class, "Acme\\Cart\\Api\\CartManagementInterface");
                assert_eq!(r.service_method, "getCartForCustomer");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
