//! PHP parser using tree-sitter
//!
//! Walks the syntax tree once, resolving every referenced class name against
//! the namespace and imports in effect, and records declared types, their
//! methods, and each usage site.

use super::names::{parse_use_statement, NameContext};
use super::outline::{
    FileOutline, MethodOutline, ParamOutline, SourceNode, TypeKind, TypeOutline, Usage, UsageKind,
};
use anyhow::{bail, Context, Result};
use tree_sitter::{Node, Parser};

/// Parse PHP source into an outline.
///
/// A file containing syntax errors is rejected as a whole so that partial
/// trees never contribute edges.
pub fn parse_source(source: &str, locator: &str) -> Result<FileOutline> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
        .context("Failed to set PHP language")?;

    let tree = parser
        .parse(source, None)
        .context("Failed to parse PHP source")?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        bail!("syntax error near line {}", line);
    }

    let mut walker = Walker {
        source: source.as_bytes(),
        names: NameContext::new(),
        outline: FileOutline::new(locator),
        types: Vec::new(),
        member: None,
    };
    walker.walk(root);
    Ok(walker.outline)
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn end_line_of(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

fn first_error_line(node: Node) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

fn is_class_name(node: Node) -> bool {
    matches!(node.kind(), "name" | "qualified_name")
}

struct Walker<'a> {
    source: &'a [u8],
    names: NameContext,
    outline: FileOutline,
    /// Indices into `outline.types` for the enclosing declarations
    types: Vec<usize>,
    member: Option<String>,
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn named_children(node: Node) -> Vec<Node> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).collect()
    }

    /// Class names under `node`, outermost first. Primitive and relative
    /// types are skipped.
    fn class_names_in(&self, node: Node) -> Vec<(String, u32)> {
        if is_class_name(node) {
            return vec![(self.text(node).to_string(), line_of(node))];
        }
        match node.kind() {
            "primitive_type" | "relative_scope" | "variable_name" => Vec::new(),
            _ => Self::named_children(node)
                .into_iter()
                .flat_map(|c| self.class_names_in(c))
                .collect(),
        }
    }

    fn record(&mut self, kind: UsageKind, raw: &str, line: u32) {
        let Some(type_name) = self.names.resolve(raw) else {
            return;
        };
        let enclosing_type = self
            .types
            .last()
            .map(|&i| self.outline.types[i].name.clone());
        self.outline.nodes.push(SourceNode::Usage(Usage {
            kind,
            type_name,
            line,
            enclosing_type,
            enclosing_member: self.member.clone(),
        }));
    }

    fn record_all(&mut self, kind: UsageKind, node: Node) {
        for (raw, line) in self.class_names_in(node) {
            self.record(kind, &raw, line);
        }
    }

    fn walk_children(&mut self, node: Node) {
        for child in Self::named_children(node) {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: Node) {
        match node.kind() {
            "namespace_definition" => {
                self.namespace(node);
                return;
            }
            "namespace_use_declaration" => {
                let line = line_of(node);
                for clause in parse_use_statement(self.text(node)) {
                    self.names.add_import(&clause.name, clause.alias.as_deref());
                    self.outline.nodes.push(SourceNode::Import {
                        name: clause.name,
                        alias: clause.alias,
                        line,
                    });
                }
                return;
            }
            "class_declaration" | "interface_declaration" | "trait_declaration"
            | "enum_declaration" => {
                self.type_declaration(node);
                return;
            }
            "base_clause" => {
                self.record_all(UsageKind::Extends, node);
                return;
            }
            "class_interface_clause" => {
                self.record_all(UsageKind::Implements, node);
                return;
            }
            "use_declaration" => {
                for child in Self::named_children(node) {
                    if is_class_name(child) {
                        let raw = self.text(child);
                        self.record(UsageKind::TraitUse, raw, line_of(child));
                    }
                }
                return;
            }
            "method_declaration" | "function_definition" => {
                self.function_like(node);
                return;
            }
            "anonymous_function" | "anonymous_function_creation_expression" | "arrow_function" => {
                self.signature(node);
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body);
                }
                return;
            }
            "property_declaration" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.record_all(UsageKind::PropertyType, ty);
                }
            }
            "object_creation_expression" => {
                if let Some(class) = Self::named_children(node).into_iter().find(|c| is_class_name(*c)) {
                    let raw = self.text(class);
                    self.record(UsageKind::Instantiation, raw, line_of(class));
                }
            }
            "scoped_call_expression" | "scoped_property_access_expression" => {
                if let Some(scope) = node.child_by_field_name("scope").filter(|s| is_class_name(*s)) {
                    let raw = self.text(scope);
                    self.record(UsageKind::StaticAccess, raw, line_of(scope));
                }
            }
            "class_constant_access_expression" => {
                if let Some(scope) = node.named_child(0).filter(|s| is_class_name(*s)) {
                    let raw = self.text(scope);
                    self.record(UsageKind::StaticAccess, raw, line_of(scope));
                }
            }
            "catch_clause" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.record_all(UsageKind::Catch, ty);
                }
            }
            "binary_expression" => {
                let mut cursor = node.walk();
                let is_instanceof = node
                    .children(&mut cursor)
                    .any(|c| c.kind().eq_ignore_ascii_case("instanceof"));
                if is_instanceof {
                    if let Some(right) = node.child_by_field_name("right").filter(|r| is_class_name(*r)) {
                        let raw = self.text(right);
                        self.record(UsageKind::InstanceOf, raw, line_of(right));
                    }
                }
            }
            _ => {}
        }
        self.walk_children(node);
    }

    fn namespace(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("");
        self.names.enter_namespace(name);
        if let Some(ns) = self.names.namespace() {
            self.outline.nodes.push(SourceNode::Namespace {
                name: ns.to_string(),
                line: line_of(node),
            });
        }
        // Braced namespaces scope their own body; the statement form runs to
        // the next namespace or end of file.
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body);
            self.names.enter_namespace("");
        }
    }

    fn type_declaration(&mut self, node: Node) {
        let kind = match node.kind() {
            "interface_declaration" => TypeKind::Interface,
            "trait_declaration" => TypeKind::Trait,
            "enum_declaration" => TypeKind::Enum,
            _ => TypeKind::Class,
        };
        let Some(name_node) = node.child_by_field_name("name") else {
            self.walk_children(node);
            return;
        };
        let name = self.names.qualify_declared(self.text(name_node));
        let (line_start, line_end) = (line_of(node), end_line_of(node));

        self.outline.nodes.push(SourceNode::TypeDeclaration {
            kind,
            name: name.clone(),
            line_start,
            line_end,
        });
        self.outline.types.push(TypeOutline {
            kind,
            name,
            line_start,
            line_end,
            methods: Vec::new(),
        });
        self.types.push(self.outline.types.len() - 1);
        let previous = self.member.take();

        for child in Self::named_children(node) {
            if child.id() != name_node.id() {
                self.walk(child);
            }
        }

        self.member = previous;
        self.types.pop();
    }

    fn function_like(&mut self, node: Node) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let previous = self.member.replace(name.clone());
        let params = self.signature(node);
        let body = node.child_by_field_name("body");

        if node.kind() == "method_declaration" {
            if let Some(&idx) = self.types.last() {
                let method = MethodOutline {
                    name,
                    params,
                    body: body.map(|b| self.text(b).to_string()).unwrap_or_default(),
                    line_start: line_of(node),
                    line_end: end_line_of(node),
                };
                self.outline.types[idx].methods.push(method);
            }
        }

        if let Some(body) = body {
            self.walk(body);
        }
        self.member = previous;
    }

    /// Record parameter and return types; returns the parameter list.
    fn signature(&mut self, node: Node) -> Vec<ParamOutline> {
        let mut params = Vec::new();
        if let Some(list) = node.child_by_field_name("parameters") {
            for param in Self::named_children(list) {
                if !matches!(
                    param.kind(),
                    "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
                ) {
                    continue;
                }
                let ty = param.child_by_field_name("type");
                if let Some(ty) = ty {
                    self.record_all(UsageKind::ParameterType, ty);
                }
                if let Some(default) = param.child_by_field_name("default_value") {
                    self.walk(default);
                }
                let name = param
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                params.push(ParamOutline {
                    name,
                    type_name: ty.map(|t| self.text(t).trim().to_string()),
                });
            }
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            self.record_all(UsageKind::ReturnType, ret);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CART: &str = r#"<?php
namespace Acme\Cart\Model;

use Acme\Catalog\Api\ProductRepositoryInterface;
use Acme\Sales\Model\{Order, OrderFactory as Factory};
use Acme\Core\Traits\Loggable;

class Cart extends \Acme\Core\Model\AbstractModel implements CartInterface
{
    use Loggable;

    private ?ProductRepositoryInterface $repository;

    public function __construct(ProductRepositoryInterface $repository, private Factory $factory)
    {
        $this->repository = $repository;
    }

    public function place(int $qty): Order
    {
        try {
            $order = new Order();
            $helper = \Acme\Util\Helper::format($qty);
            $type = Factory::class;
            if ($order instanceof \Acme\Sales\Model\Invoice) {
                return $order;
            }
            return self::build($qty);
        } catch (\Acme\Core\Exception\CartException $e) {
            throw new \RuntimeException('x');
        }
    }
}
"#;

    fn usages(outline: &FileOutline, kind: UsageKind) -> Vec<String> {
        outline
            .usages()
            .filter(|u| u.kind == kind)
            .map(|u| u.type_name.clone())
            .collect()
    }

    #[test]
    fn test_parse_cart_usages() {
        let outline = parse_source(CART, "app/code/Acme/Cart/Model/Cart.php").unwrap();

        assert_eq!(outline.types.len(), 1);
        assert_eq!(outline.types[0].name, "Acme\\Cart\\Model\\Cart");
        assert_eq!(
            usages(&outline, UsageKind::Extends),
            vec!["Acme\\Core\\Model\\AbstractModel"]
        );
        assert_eq!(
            usages(&outline, UsageKind::Implements),
            vec!["Acme\\Cart\\Model\\CartInterface"]
        );
        assert_eq!(
            usages(&outline, UsageKind::TraitUse),
            vec!["Acme\\Core\\Traits\\Loggable"]
        );
        assert_eq!(
            usages(&outline, UsageKind::PropertyType),
            vec!["Acme\\Catalog\\Api\\ProductRepositoryInterface"]
        );
        assert_eq!(
            usages(&outline, UsageKind::ParameterType),
            vec![
                "Acme\\Catalog\\Api\\ProductRepositoryInterface",
                "Acme\\Sales\\Model\\OrderFactory"
            ]
        );
        assert_eq!(usages(&outline, UsageKind::ReturnType), vec!["Acme\\Sales\\Model\\Order"]);
        assert_eq!(usages(&outline, UsageKind::Instantiation), vec!["Acme\\Sales\\Model\\Order"]);
        assert_eq!(
            usages(&outline, UsageKind::StaticAccess),
            vec!["Acme\\Util\\Helper", "Acme\\Sales\\Model\\OrderFactory"]
        );
        assert_eq!(
            usages(&outline, UsageKind::InstanceOf),
            vec!["Acme\\Sales\\Model\\Invoice"]
        );
        assert_eq!(
            usages(&outline, UsageKind::Catch),
            vec!["Acme\\Core\\Exception\\CartException"]
        );
    }

    #[test]
    fn test_imports_recorded_but_not_usages() {
        let outline = parse_source(CART, "Cart.php").unwrap();
        let imports = outline
            .nodes
            .iter()
            .filter(|n| matches!(n, SourceNode::Import { .. }))
            .count();
        assert_eq!(imports, 4);
        assert!(!outline
            .usages()
            .any(|u| u.type_name == "Acme\\Sales\\Model\\OrderFactory" && u.kind == UsageKind::Instantiation));
    }

    #[test]
    fn test_method_outlines_carry_params_and_body() {
        let outline = parse_source(CART, "Cart.php").unwrap();
        let place = outline.types[0].method("place").unwrap();
        assert_eq!(place.params.len(), 1);
        assert_eq!(place.params[0].name, "$qty");
        assert_eq!(place.params[0].type_name.as_deref(), Some("int"));
        assert!(place.body.contains("new Order()"));

        let usage = outline
            .usages()
            .find(|u| u.kind == UsageKind::Instantiation)
            .unwrap();
        assert_eq!(usage.enclosing_type.as_deref(), Some("Acme\\Cart\\Model\\Cart"));
        assert_eq!(usage.enclosing_member.as_deref(), Some("place"));
    }

    #[test]
    fn test_syntax_error_rejected() {
        let err = parse_source("<?php\nclass {\n", "Broken.php").unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_file_without_namespace() {
        let outline = parse_source(
            "<?php\nclass Legacy { public function run(Mage_Core_Model $m) {} }\n",
            "Legacy.php",
        )
        .unwrap();
        assert_eq!(outline.types[0].name, "Legacy");
        assert_eq!(usages(&outline, UsageKind::ParameterType), vec!["Mage_Core_Model"]);
    }
}
