//! `etc/module.xml`: module name and load sequence

use super::{attr, children_named, element_evidence, missing, parse_xml};
use super::{Declaration, ModuleDeclaration};
use crate::errors::{Extraction, Warning};
use crate::models::ids;

pub fn parse_module_xml(content: &str, locator: &str) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let doc = match parse_xml(content, locator) {
        Ok(doc) => doc,
        Err(warning) => {
            out.warn(warning);
            return out;
        }
    };

    for module in children_named(doc.root_element(), "module") {
        let Some(name) = attr(module, "name") else {
            out.warn(missing(&doc, module, locator, "'name'"));
            continue;
        };
        let mut sequence: Vec<String> = Vec::new();
        for seq in children_named(module, "sequence") {
            for dep in children_named(seq, "module") {
                match attr(dep, "name") {
                    Some(dep) if !sequence.iter().any(|s| s == dep) => sequence.push(ids::module_id(dep)),
                    Some(_) => {}
                    None => out.warn(missing(&doc, dep, locator, "'name'")),
                }
            }
        }
        out.value.push(Declaration::Module(ModuleDeclaration {
            name: ids::module_id(name),
            sequence,
            evidence: element_evidence(&doc, module, locator, "module declaration"),
        }));
    }

    if out.value.is_empty() && out.warnings.is_empty() {
        out.warn(Warning::invalid_declaration(locator, "no <module> element"));
    }
    out
}
