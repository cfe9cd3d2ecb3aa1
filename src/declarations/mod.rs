//! Declaration file parsing
//!
//! Each supported configuration file kind is parsed into tagged
//! [`Declaration`] records. Required attributes are checked here, at the
//! parse boundary: a record missing one is dropped with an
//! `invalid_declaration` warning, and a file that is not well-formed yields a
//! single `parse_failure` warning and no records.

mod composer;
mod di;
mod events;
mod merge;
mod module_xml;
mod theme;
mod webapi;

pub use composer::parse_composer;
pub use di::parse_di;
pub use events::parse_events;
pub use merge::{merge_observers, merge_plugins, MergedObserver, MergedPlugin};
pub use module_xml::parse_module_xml;
pub use theme::{parse_theme, theme_id_from_path, theme_id_from_registration};
pub use webapi::parse_webapi;

use crate::errors::{Extraction, Warning};
use crate::models::Evidence;
use serde::{Deserialize, Serialize};

/// Kinds of declaration files, identified by file name and location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    ModuleXml,
    ThemeXml,
    Composer,
    Di,
    Events,
    Webapi,
}

impl FileKind {
    /// Kinds whose records are scoped by the directory they live in.
    pub fn is_scoped(&self) -> bool {
        matches!(self, FileKind::Di | FileKind::Events)
    }
}

/// Where a declaration file sits: its kind and, for scoped kinds, its scope
/// directory (`None` means directly under `etc/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlacement {
    pub kind: FileKind,
    pub scope_dir: Option<String>,
}

/// Classify a `/`-separated locator as a declaration file.
pub fn classify(locator: &str) -> Option<FilePlacement> {
    let parts: Vec<&str> = locator.split('/').collect();
    let file = *parts.last()?;

    match file {
        "composer.json" => {
            return Some(FilePlacement {
                kind: FileKind::Composer,
                scope_dir: None,
            })
        }
        "theme.xml" => {
            return Some(FilePlacement {
                kind: FileKind::ThemeXml,
                scope_dir: None,
            })
        }
        _ => {}
    }

    let etc = parts.iter().rposition(|p| *p == "etc")?;
    let between = &parts[etc + 1..parts.len() - 1];
    let kind = match file {
        "module.xml" => FileKind::ModuleXml,
        "di.xml" => FileKind::Di,
        "events.xml" => FileKind::Events,
        "webapi.xml" => FileKind::Webapi,
        _ => return None,
    };

    match (kind.is_scoped(), between) {
        (_, []) => Some(FilePlacement {
            kind,
            scope_dir: None,
        }),
        (true, [scope]) => Some(FilePlacement {
            kind,
            scope_dir: Some(scope.to_string()),
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDeclaration {
    pub name: String,
    /// Modules that must load before this one, in declared order
    pub sequence: Vec<String>,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDeclaration {
    /// `area/Vendor/name`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Parent theme ID, already qualified with the area
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
    /// Required package names in file order
    pub require: Vec<String>,
    /// PSR-4 namespace prefixes, normalised with a trailing separator
    pub namespaces: Vec<String>,
    pub evidence: Evidence,
}

impl PackageDeclaration {
    pub fn is_library(&self) -> bool {
        self.package_type
            .as_deref()
            .map(|t| t == "library" || t.ends_with("-library"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub scope: String,
    /// The abstraction being overridden
    pub target: String,
    pub implementation: String,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualType {
    pub scope: String,
    pub name: String,
    pub base_type: String,
    pub evidence: Evidence,
}

/// A plugin attachment as written in one file. Only `name` is required:
/// later files may change just `disabled` or `sort_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDeclaration {
    pub scope: String,
    pub target: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    pub evidence: Evidence,
}

/// A constructor argument injected as an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectArgument {
    pub scope: String,
    pub target: String,
    pub argument: String,
    pub value_type: String,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverDeclaration {
    pub scope: String,
    pub event: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub url: String,
    pub http_method: String,
    pub service_class: String,
    pub service_method: String,
    pub evidence: Evidence,
}

/// One parsed declaration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Module(ModuleDeclaration),
    Theme(ThemeDeclaration),
    Package(PackageDeclaration),
    Preference(Preference),
    VirtualType(VirtualType),
    Plugin(PluginDeclaration),
    Argument(ObjectArgument),
    Observer(ObserverDeclaration),
    Route(RouteDeclaration),
}

impl Declaration {
    pub fn evidence(&self) -> &Evidence {
        match self {
            Declaration::Module(d) => &d.evidence,
            Declaration::Theme(d) => &d.evidence,
            Declaration::Package(d) => &d.evidence,
            Declaration::Preference(d) => &d.evidence,
            Declaration::VirtualType(d) => &d.evidence,
            Declaration::Plugin(d) => &d.evidence,
            Declaration::Argument(d) => &d.evidence,
            Declaration::Observer(d) => &d.evidence,
            Declaration::Route(d) => &d.evidence,
        }
    }
}

/// Parse one declaration file's content.
///
/// `scope` is the resolved scope for scoped kinds and is ignored otherwise.
/// `registration` is the sibling `registration.php` content for themes.
pub fn parse_declaration_file(
    placement: &FilePlacement,
    content: &str,
    locator: &str,
    scope: &str,
    registration: Option<&str>,
) -> Extraction<Vec<Declaration>> {
    match placement.kind {
        FileKind::ModuleXml => parse_module_xml(content, locator),
        FileKind::ThemeXml => parse_theme(content, locator, registration),
        FileKind::Composer => parse_composer(content, locator),
        FileKind::Di => parse_di(content, locator, scope),
        FileKind::Events => parse_events(content, locator, scope),
        FileKind::Webapi => parse_webapi(content, locator),
    }
}

// ---------------------------------------------------------------------------
// XML helpers shared by the parsers
// ---------------------------------------------------------------------------

const SNIPPET_LIMIT: usize = 200;

fn parse_xml<'input>(
    content: &'input str,
    locator: &str,
) -> Result<roxmltree::Document<'input>, Warning> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(content, options)
        .map_err(|e| Warning::parse_failure(locator, e.to_string()))
}

fn line_of(doc: &roxmltree::Document, node: roxmltree::Node) -> u32 {
    doc.text_pos_at(node.range().start).row
}

/// The element's start tag, used as its evidence snippet.
fn start_tag(doc: &roxmltree::Document, node: roxmltree::Node) -> String {
    let text = &doc.input_text()[node.range()];
    let end = text.find('>').map(|i| i + 1).unwrap_or(text.len());
    let tag = text[..end].split_whitespace().collect::<Vec<_>>().join(" ");
    if tag.len() > SNIPPET_LIMIT {
        let mut cut = SNIPPET_LIMIT;
        while !tag.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &tag[..cut])
    } else {
        tag
    }
}

fn element_evidence(
    doc: &roxmltree::Document,
    node: roxmltree::Node,
    locator: &str,
    note: impl Into<String>,
) -> Evidence {
    Evidence::declaration(locator, Some(line_of(doc, node)), start_tag(doc, node), note)
}

/// Non-empty, trimmed attribute value.
fn attr<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).map(str::trim).filter(|v| !v.is_empty())
}

fn bool_attr(node: roxmltree::Node, name: &str) -> Option<bool> {
    attr(node, name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
}

fn is_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn children_named<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children().filter(move |c| is_element(c, name))
}

fn missing(
    doc: &roxmltree::Document,
    node: roxmltree::Node,
    locator: &str,
    what: &str,
) -> Warning {
    Warning::invalid_declaration(
        locator,
        format!(
            "<{}> on line {} is missing {}",
            node.tag_name().name(),
            line_of(doc, node),
            what
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_scope_directories() {
        assert_eq!(
            classify("app/code/Acme/Cart/etc/di.xml"),
            Some(FilePlacement { kind: FileKind::Di, scope_dir: None })
        );
        assert_eq!(
            classify("app/code/Acme/Cart/etc/frontend/di.xml"),
            Some(FilePlacement { kind: FileKind::Di, scope_dir: Some("frontend".into()) })
        );
        assert_eq!(
            classify("app/code/Acme/Cart/etc/adminhtml/events.xml").map(|p| p.kind),
            Some(FileKind::Events)
        );
        assert_eq!(
            classify("app/code/Acme/Cart/etc/module.xml").map(|p| p.kind),
            Some(FileKind::ModuleXml)
        );
        assert_eq!(classify("app/code/Acme/Cart/etc/frontend/module.xml"), None);
        assert_eq!(classify("app/code/Acme/Cart/etc/a/b/di.xml"), None);
        assert_eq!(classify("app/code/Acme/Cart/Model/di.xml"), None);
        assert_eq!(classify("app/code/Acme/Cart/etc/config.xml"), None);
        assert_eq!(
            classify("vendor/acme/lib/composer.json").map(|p| p.kind),
            Some(FileKind::Composer)
        );
    }

    #[test]
    fn test_start_tag_snippet_is_single_line() {
        let xml = "<config>\n  <preference for=\"A\"\n      type=\"B\"/>\n</config>";
        let doc = parse_xml(xml, "di.xml").unwrap();
        let pref = doc.descendants().find(|n| is_element(n, "preference")).unwrap();
        assert_eq!(start_tag(&doc, pref), "<preference for=\"A\" type=\"B\"/>");
        assert_eq!(line_of(&doc, pref), 2);
    }

    #[test]
    fn test_malformed_xml_is_parse_failure() {
        let warning = parse_xml("<config><oops></config>", "etc/di.xml").unwrap_err();
        assert_eq!(warning.kind, crate::errors::WarningKind::ParseFailure);
        assert_eq!(warning.file.as_deref(), Some("etc/di.xml"));
    }
}
