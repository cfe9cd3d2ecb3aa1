//! Class-name resolution against the current namespace and `use` imports

use crate::models::ids;
use std::collections::BTreeMap;

/// Primitive and pseudo types that never denote a class.
const PRIMITIVE_TYPES: &[&str] = &[
    "int", "integer", "float", "double", "string", "bool", "boolean", "array", "mixed", "void",
    "null", "callable", "iterable", "object", "never", "false", "true", "resource", "numeric",
];

/// Keywords that refer to the enclosing class hierarchy.
const RELATIVE_SCOPES: &[&str] = &["self", "static", "parent", "$this"];

/// Runtime classes shipped with the language itself.
const BUILTIN_CLASSES: &[&str] = &[
    "stdclass",
    "exception",
    "error",
    "throwable",
    "typeerror",
    "valueerror",
    "argumentcounterror",
    "arithmeticerror",
    "divisionbyzeroerror",
    "errorexception",
    "runtimeexception",
    "logicexception",
    "invalidargumentexception",
    "domainexception",
    "lengthexception",
    "outofrangeexception",
    "outofboundsexception",
    "rangeexception",
    "overflowexception",
    "underflowexception",
    "unexpectedvalueexception",
    "badfunctioncallexception",
    "badmethodcallexception",
    "jsonexception",
    "closure",
    "generator",
    "traversable",
    "iterator",
    "iteratoraggregate",
    "arrayaccess",
    "countable",
    "serializable",
    "jsonserializable",
    "stringable",
    "unitenum",
    "backedenum",
    "arrayobject",
    "arrayiterator",
    "splobjectstorage",
    "splqueue",
    "splstack",
    "splfileinfo",
    "datetime",
    "datetimeimmutable",
    "datetimeinterface",
    "datetimezone",
    "dateinterval",
    "dateperiod",
    "reflectionclass",
    "reflectionmethod",
    "reflectionproperty",
    "reflectionexception",
    "weakmap",
    "pdo",
    "pdostatement",
    "pdoexception",
    "simplexmlelement",
    "domdocument",
    "domelement",
    "domnode",
    "domxpath",
];

/// True for primitive names and language-provided classes (case-insensitive).
pub fn is_builtin_type(name: &str) -> bool {
    let normalized = ids::normalize_type(name).to_ascii_lowercase();
    if normalized.contains('\\') {
        return false;
    }
    let bare = normalized.trim_start_matches('?');
    PRIMITIVE_TYPES.contains(&bare)
        || RELATIVE_SCOPES.contains(&bare)
        || BUILTIN_CLASSES.contains(&bare)
}

/// Namespace and import state at some point in a source file.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    namespace: Option<String>,
    /// Lower-cased alias → fully-qualified name
    imports: BTreeMap<String, String>,
}

impl NameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entering a namespace discards imports from the previous one.
    pub fn enter_namespace(&mut self, name: &str) {
        let name = ids::normalize_type(name);
        self.namespace = if name.is_empty() { None } else { Some(name) };
        self.imports.clear();
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn add_import(&mut self, fqcn: &str, alias: Option<&str>) {
        let fqcn = ids::normalize_type(fqcn);
        let alias = match alias {
            Some(a) => a.trim().to_string(),
            None => fqcn.rsplit('\\').next().unwrap_or(&fqcn).to_string(),
        };
        if !alias.is_empty() && !fqcn.is_empty() {
            self.imports.insert(alias.to_ascii_lowercase(), fqcn);
        }
    }

    /// Fully-qualified name for a class declared in the current namespace.
    pub fn qualify_declared(&self, short_name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, short_name.trim()),
            None => short_name.trim().to_string(),
        }
    }

    /// Resolve a referenced class name. Returns `None` for primitives,
    /// `self`/`static`/`parent`, language builtins, and empty input.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let raw = raw.trim().trim_start_matches('?').trim();
        if raw.is_empty() {
            return None;
        }

        let resolved = if let Some(stripped) = raw.strip_prefix('\\') {
            stripped.to_string()
        } else if let Some(rest) = raw
            .strip_prefix("namespace\\")
            .or_else(|| raw.strip_prefix("Namespace\\"))
        {
            self.qualify_declared(rest)
        } else {
            let (first, rest) = match raw.split_once('\\') {
                Some((first, rest)) => (first, Some(rest)),
                None => (raw, None),
            };
            if rest.is_none() && is_builtin_type(first) && self.imports.get(&first.to_ascii_lowercase()).is_none() {
                return None;
            }
            match self.imports.get(&first.to_ascii_lowercase()) {
                Some(imported) => match rest {
                    Some(rest) => format!("{}\\{}", imported, rest),
                    None => imported.clone(),
                },
                None => self.qualify_declared(raw),
            }
        };

        if is_builtin_type(&resolved) {
            None
        } else {
            Some(resolved)
        }
    }
}

/// One class import from a `use` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportClause {
    pub name: String,
    pub alias: Option<String>,
}

/// Parse the text of a namespace `use` statement into class imports.
///
/// Handles aliases, comma lists and group syntax (`use A\{B, C as D};`).
/// Function and constant imports are ignored.
pub fn parse_use_statement(text: &str) -> Vec<ImportClause> {
    let body = text
        .trim()
        .trim_end_matches(';')
        .trim()
        .strip_prefix("use")
        .unwrap_or(text)
        .trim();

    if starts_with_keyword(body, "function") || starts_with_keyword(body, "const") {
        return Vec::new();
    }

    let mut clauses = Vec::new();
    if let (Some(open), Some(close)) = (body.find('{'), body.rfind('}')) {
        let prefix = body[..open].trim().trim_end_matches('\\');
        for item in body[open + 1..close].split(',') {
            let item = item.trim();
            if item.is_empty() || starts_with_keyword(item, "function") || starts_with_keyword(item, "const") {
                continue;
            }
            if let Some(clause) = parse_clause(item) {
                clauses.push(ImportClause {
                    name: format!("{}\\{}", prefix, clause.name),
                    alias: clause.alias,
                });
            }
        }
    } else {
        clauses.extend(body.split(',').filter_map(|item| parse_clause(item.trim())));
    }
    clauses
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.len() > keyword.len()
        && text[..keyword.len()].eq_ignore_ascii_case(keyword)
        && text[keyword.len()..].starts_with(char::is_whitespace)
}

fn parse_clause(item: &str) -> Option<ImportClause> {
    let parts: Vec<&str> = item.split_whitespace().collect();
    match parts.as_slice() {
        [name] => Some(ImportClause {
            name: ids::normalize_type(name),
            alias: None,
        }),
        [name, kw, alias] if kw.eq_ignore_ascii_case("as") => Some(ImportClause {
            name: ids::normalize_type(name),
            alias: Some(alias.to_string()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NameContext {
        let mut ctx = NameContext::new();
        ctx.enter_namespace("Acme\\Cart\\Model");
        ctx.add_import("Acme\\Catalog\\Api\\ProductRepositoryInterface", None);
        ctx.add_import("Acme\\Sales\\Model\\Order", Some("SalesOrder"));
        ctx.add_import("Acme\\Quote", None);
        ctx
    }

    #[test]
    fn test_resolution_rules() {
        let ctx = ctx();
        assert_eq!(
            ctx.resolve("ProductRepositoryInterface").as_deref(),
            Some("Acme\\Catalog\\Api\\ProductRepositoryInterface")
        );
        assert_eq!(ctx.resolve("SalesOrder").as_deref(), Some("Acme\\Sales\\Model\\Order"));
        assert_eq!(ctx.resolve("Quote\\Item").as_deref(), Some("Acme\\Quote\\Item"));
        assert_eq!(ctx.resolve("Cart").as_deref(), Some("Acme\\Cart\\Model\\Cart"));
        assert_eq!(ctx.resolve("\\Other\\Thing").as_deref(), Some("Other\\Thing"));
        assert_eq!(
            ctx.resolve("namespace\\Sub\\Thing").as_deref(),
            Some("Acme\\Cart\\Model\\Sub\\Thing")
        );
        assert_eq!(ctx.resolve("?Cart").as_deref(), Some("Acme\\Cart\\Model\\Cart"));
    }

    #[test]
    fn test_builtins_filtered() {
        let ctx = ctx();
        for name in ["int", "string", "self", "static", "parent", "\\Exception", "?array", "mixed"] {
            assert_eq!(ctx.resolve(name), None, "{} should be filtered", name);
        }
        assert!(is_builtin_type("\\DateTimeInterface"));
        assert!(!is_builtin_type("Acme\\Exception"));
    }

    #[test]
    fn test_entering_namespace_clears_imports() {
        let mut ctx = ctx();
        ctx.enter_namespace("Other");
        assert_eq!(ctx.resolve("SalesOrder").as_deref(), Some("Other\\SalesOrder"));
    }

    #[test]
    fn test_parse_use_statements() {
        assert_eq!(
            parse_use_statement("use Acme\\Cart\\Model\\Cart;"),
            vec![ImportClause { name: "Acme\\Cart\\Model\\Cart".into(), alias: None }]
        );
        assert_eq!(
            parse_use_statement("use \\Acme\\Cart as C, Acme\\Sales;"),
            vec![
                ImportClause { name: "Acme\\Cart".into(), alias: Some("C".into()) },
                ImportClause { name: "Acme\\Sales".into(), alias: None },
            ]
        );
        assert_eq!(
            parse_use_statement("use Acme\\Api\\{CartInterface, TotalsInterface as Totals};"),
            vec![
                ImportClause { name: "Acme\\Api\\CartInterface".into(), alias: None },
                ImportClause {
                    name: "Acme\\Api\\TotalsInterface".into(),
                    alias: Some("Totals".into())
                },
            ]
        );
        assert!(parse_use_statement("use function Acme\\helper;").is_empty());
        assert!(parse_use_statement("use const Acme\\LIMIT;").is_empty());
    }
}
