//! Core data models shared by every analyzer
//!
//! Canonical identifiers for modules, classes, methods and DI targets, the
//! [`Evidence`] provenance record attached to every derived fact, and the
//! [`Severity`] scale used by side-effect detection.

use serde::{Deserialize, Serialize};

/// Canonical identifier derivation.
///
/// Type names are normalised by stripping the leading namespace separator so
/// `\Vendor\Module\Model\Item` and `Vendor\Module\Model\Item` collapse to one ID.
pub mod ids {
    /// Normalise a fully-qualified type name.
    pub fn normalize_type(name: &str) -> String {
        name.trim().trim_start_matches('\\').to_string()
    }

    /// Module IDs are the declared `Vendor_Module` names, kept verbatim.
    pub fn module_id(name: &str) -> String {
        name.trim().to_string()
    }

    pub fn class_id(fqcn: &str) -> String {
        format!("class:{}", normalize_type(fqcn))
    }

    pub fn method_id(fqcn: &str, method: &str) -> String {
        format!("method:{}::{}", normalize_type(fqcn), method)
    }

    /// A DI target is an override point seen from one scope.
    pub fn di_target_id(scope: &str, target: &str) -> String {
        format!("di:{}:{}", scope, normalize_type(target))
    }

    /// `Vendor_Module` -> `Vendor\Module\`
    pub fn namespace_for_module(module: &str) -> Option<String> {
        let (vendor, name) = module.split_once('_')?;
        if vendor.is_empty() || name.is_empty() {
            return None;
        }
        Some(format!("{}\\{}\\", vendor, name))
    }
}

/// Provenance record for a derived fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Source locator: path relative to the scan root, `/`-separated
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    /// Declaration snippet for facts coming from configuration files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub note: String,
    /// Confidence from 0.0 to 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Evidence {
    /// Evidence pointing at a line range in a source file.
    pub fn at_lines(source: impl Into<String>, start: u32, end: u32, note: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line_start: Some(start),
            line_end: Some(end.max(start)),
            snippet: None,
            note: note.into(),
            confidence: default_confidence(),
        }
    }

    /// Evidence pointing at a declaration in a configuration file.
    pub fn declaration(
        source: impl Into<String>,
        line: Option<u32>,
        snippet: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            line_start: line,
            line_end: line,
            snippet: Some(snippet.into()),
            note: note.into(),
            confidence: default_confidence(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Severity levels for detected side effects
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Path relative to `root`, always `/`-separated so output is platform independent.
pub fn relative_locator(root: &std::path::Path, path: &std::path::Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_ids_strip_leading_separator() {
        assert_eq!(
            ids::class_id("\\Vendor\\Sales\\Model\\Order"),
            "class:Vendor\\Sales\\Model\\Order"
        );
        assert_eq!(
            ids::method_id("Vendor\\Sales\\Model\\Order", "place"),
            "method:Vendor\\Sales\\Model\\Order::place"
        );
        assert_eq!(
            ids::di_target_id("frontend", "\\Vendor\\Api\\CartInterface"),
            "di:frontend:Vendor\\Api\\CartInterface"
        );
    }

    #[test]
    fn test_namespace_for_module() {
        assert_eq!(
            ids::namespace_for_module("Acme_Checkout").as_deref(),
            Some("Acme\\Checkout\\")
        );
        assert_eq!(ids::namespace_for_module("nounderscore"), None);
        assert_eq!(ids::namespace_for_module("_Broken"), None);
    }

    #[test]
    fn test_evidence_confidence_is_clamped() {
        let e = Evidence::at_lines("a.php", 3, 1, "new Foo").with_confidence(1.7);
        assert_eq!(e.confidence, 1.0);
        assert_eq!(e.line_end, Some(3));
    }

    #[test]
    fn test_relative_locator() {
        let root = Path::new("/repo");
        assert_eq!(
            relative_locator(root, Path::new("/repo/app/code/A/B/etc/di.xml")),
            "app/code/A/B/etc/di.xml"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }
}
