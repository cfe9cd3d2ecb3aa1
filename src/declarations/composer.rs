//! `composer.json`: package name, type, requirements and PSR-4 prefixes

use super::{Declaration, PackageDeclaration};
use crate::errors::{Extraction, Warning};
use crate::models::Evidence;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct ComposerFile {
    name: Option<String>,
    #[serde(rename = "type")]
    package_type: Option<String>,
    #[serde(default)]
    require: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    autoload: Autoload,
}

#[derive(Debug, Default, Deserialize)]
struct Autoload {
    #[serde(rename = "psr-4", default)]
    psr4: BTreeMap<String, serde_json::Value>,
}

pub fn parse_composer(content: &str, locator: &str) -> Extraction<Vec<Declaration>> {
    let mut out = Extraction::new(Vec::new());
    let file: ComposerFile = match serde_json::from_str(content) {
        Ok(file) => file,
        Err(e) => {
            out.warn(Warning::parse_failure(locator, e.to_string()));
            return out;
        }
    };

    let Some(name) = file.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        out.warn(Warning::invalid_declaration(locator, "package has no 'name'"));
        return out;
    };

    // Platform requirements are not packages
    let require: Vec<String> = file
        .require
        .keys()
        .filter(|k| k.contains('/'))
        .cloned()
        .collect();

    let namespaces: Vec<String> = file
        .autoload
        .psr4
        .keys()
        .map(|prefix| prefix.trim_start_matches('\\').to_string())
        .filter(|prefix| !prefix.is_empty())
        .map(|prefix| {
            if prefix.ends_with('\\') {
                prefix
            } else {
                format!("{}\\", prefix)
            }
        })
        .collect();

    let line = content
        .lines()
        .position(|l| l.contains("\"name\""))
        .map(|i| i as u32 + 1);
    let evidence = Evidence::declaration(locator, line, format!("\"name\": \"{}\"", name), "composer package");

    out.value.push(Declaration::Package(PackageDeclaration {
        name,
        package_type: file.package_type,
        require,
        namespaces,
        evidence,
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_library_package() {
        let json = r#"{
    "name": "acme/money",
    "type": "magento2-library",
    "require": { "php": ">=8.1", "ext-json": "*", "acme/core": "^1.0" },
    "autoload": { "psr-4": { "Acme\\Money\\": "src/", "\\Acme\\Money\\Legacy": "legacy/" } }
}"#;
        let result = parse_composer(json, "vendor/acme/money/composer.json");
        assert!(result.warnings.is_empty());
        match &result.value[0] {
            Declaration::Package(p) => {
                assert!(p.is_library());
                assert_eq!(p.require, vec!["acme/core"]);
                assert_eq!(p.namespaces, vec!["Acme\\Money\\", "Acme\\Money\\Legacy\\"]);
                assert_eq!(p.evidence.line_start, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_parse_failure() {
        let result = parse_composer("{ not json", "composer.json");
        assert!(result.value.is_empty());
        assert_eq!(result.warnings[0].kind, crate::errors::WarningKind::ParseFailure);
    }

    #[test]
    fn test_module_package_is_not_library() {
        let result = parse_composer(r#"{"name": "acme/module-cart", "type": "magento2-module"}"#, "composer.json");
        match &result.value[0] {
            Declaration::Package(p) => assert!(!p.is_library()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
