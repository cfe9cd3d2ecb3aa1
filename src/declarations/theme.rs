//! `theme.xml` plus the sibling `registration.php`

use super::{children_named, element_evidence, parse_xml};
use super::{Declaration, ThemeDeclaration};
use crate::errors::{Extraction, Warning};
use regex::Regex;
use std::sync::OnceLock;

fn theme_registration() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"ComponentRegistrar::THEME\s*,\s*['"]([^'"]+)['"]"#).expect("valid regex")
    })
}

/// Theme ID declared in a `registration.php`.
pub fn theme_id_from_registration(source: &str) -> Option<String> {
    theme_registration()
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Theme ID from a `.../design/<area>/<Vendor>/<name>/theme.xml` locator.
pub fn theme_id_from_path(locator: &str) -> Option<String> {
    let parts: Vec<&str> = locator.split('/').collect();
    let design = parts.iter().rposition(|p| *p == "design")?;
    match &parts[design + 1..] {
        [area, vendor, name, _file] => Some(format!("{}/{}/{}", area, vendor, name)),
        _ => None,
    }
}

pub fn parse_theme(
    content: &str,
    locator: &str,
    registration: Option<&str>,
) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let doc = match parse_xml(content, locator) {
        Ok(doc) => doc,
        Err(warning) => {
            out.warn(warning);
            return out;
        }
    };

    let Some(id) = registration
        .and_then(theme_id_from_registration)
        .or_else(|| theme_id_from_path(locator))
    else {
        out.warn(Warning::invalid_declaration(
            locator,
            "cannot determine theme ID from registration.php or path",
        ));
        return out;
    };

    let root = doc.root_element();
    let text_of = |name: &'static str| {
        children_named(root, name)
            .next()
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    };
    let area = id.split('/').next().unwrap_or_default().to_string();
    let parent = text_of("parent").map(|p| {
        if p.matches('/').count() >= 2 {
            p
        } else {
            format!("{}/{}", area, p)
        }
    });

    out.value.push(Declaration::Theme(ThemeDeclaration {
        id,
        title: text_of("title"),
        parent,
        evidence: element_evidence(&doc, root, locator, "theme declaration"),
    }));
    out
}
