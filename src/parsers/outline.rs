//! Parsed outline of one source file
//!
//! An outline is the closed set of facts the analyzers need from a source
//! file: namespace and imports, declared types with their methods, and every
//! class-usage site. Consumers walk it through [`SourceVisitor`].

use serde::{Deserialize, Serialize};

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Trait,
    Enum,
}

/// How a source location uses another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Instantiation,
    StaticAccess,
    Extends,
    Implements,
    TraitUse,
    ParameterType,
    ReturnType,
    PropertyType,
    Catch,
    InstanceOf,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Instantiation => "instantiation",
            UsageKind::StaticAccess => "static access",
            UsageKind::Extends => "extends",
            UsageKind::Implements => "implements",
            UsageKind::TraitUse => "trait use",
            UsageKind::ParameterType => "parameter type",
            UsageKind::ReturnType => "return type",
            UsageKind::PropertyType => "property type",
            UsageKind::Catch => "catch",
            UsageKind::InstanceOf => "instanceof",
        }
    }
}

/// A single usage of a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub kind: UsageKind,
    /// Fully-qualified, normalised type name
    pub type_name: String,
    pub line: u32,
    /// Enclosing declared type, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_type: Option<String>,
    /// Enclosing method or function, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_member: Option<String>,
}

/// The closed set of node categories an outline can contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum SourceNode {
    Namespace {
        name: String,
        line: u32,
    },
    /// `use` import; never produces an edge on its own
    Import {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        line: u32,
    },
    TypeDeclaration {
        kind: TypeKind,
        name: String,
        line_start: u32,
        line_end: u32,
    },
    Usage(Usage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamOutline {
    /// Including the leading `$`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodOutline {
    pub name: String,
    pub params: Vec<ParamOutline>,
    /// Raw body text including braces; empty for abstract methods
    pub body: String,
    pub line_start: u32,
    pub line_end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOutline {
    pub kind: TypeKind,
    pub name: String,
    pub line_start: u32,
    pub line_end: u32,
    pub methods: Vec<MethodOutline>,
}

impl TypeOutline {
    pub fn method(&self, name: &str) -> Option<&MethodOutline> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutline {
    /// Path relative to the scan root
    pub locator: String,
    pub types: Vec<TypeOutline>,
    /// Nodes in source order
    pub nodes: Vec<SourceNode>,
}

impl FileOutline {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ..Default::default()
        }
    }

    /// Feed every node to `visitor` in source order.
    pub fn accept<V: SourceVisitor + ?Sized>(&self, visitor: &mut V) {
        for node in &self.nodes {
            visitor.visit(self, node);
        }
    }

    pub fn usages(&self) -> impl Iterator<Item = &Usage> {
        self.nodes.iter().filter_map(|n| match n {
            SourceNode::Usage(u) => Some(u),
            _ => None,
        })
    }
}

/// Consumer of outline nodes.
///
/// Implementors match on [`SourceNode`] exhaustively so that adding a node
/// category is a compile error everywhere it must be handled.
pub trait SourceVisitor {
    fn visit(&mut self, file: &FileOutline, node: &SourceNode);
}
