//! Module registry and resolver
//!
//! Modules come from `etc/module.xml`, `theme.xml` and library-type
//! `composer.json` declarations. The [`ModuleIndex`] maps both file paths
//! (longest root prefix) and class names (longest namespace prefix) to the
//! owning module.

mod load_order;

pub use load_order::load_order;

use crate::declarations::{Declaration, ModuleDeclaration, PackageDeclaration, ThemeDeclaration};
use crate::errors::{Extraction, Warning};
use crate::models::{ids, Evidence};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Primary unit with `etc/module.xml`
    Module,
    Theme,
    /// External package known only through `composer.json`
    Library,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Module => "module",
            ModuleKind::Theme => "theme",
            ModuleKind::Library => "library",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub kind: ModuleKind,
    /// Root directory locator
    pub root: String,
    /// Namespace prefixes owned by the module, each ending in `\`
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub sequence: Vec<String>,
    /// Required composer packages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_theme: Option<String>,
    /// Scopes the module declares configuration in
    pub scopes: BTreeSet<String>,
    pub evidence: Evidence,
}

/// Maps paths and class names to module IDs. `None` means unknown.
pub trait ModuleResolver {
    /// `path` is relative to the project root.
    fn module_for_path(&self, path: &Path) -> Option<&str>;
    fn module_for_type(&self, fqcn: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<String, Module>,
    /// (root locator, module ID), longest root first
    roots: Vec<(String, String)>,
    /// (namespace prefix, module ID), longest prefix first
    namespaces: Vec<(String, String)>,
    packages: BTreeMap<String, String>,
    virtual_types: BTreeMap<String, String>,
}

fn parent_dir(locator: &str) -> &str {
    locator.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

impl ModuleIndex {
    /// Build the index from module, theme and package declarations.
    ///
    /// Declarations must be ordered by locator. The first module seen with a
    /// given ID wins; later duplicates are warned and ignored.
    pub fn from_declarations<'a>(
        declarations: impl IntoIterator<Item = &'a Declaration>,
    ) -> Extraction<Self> {
        let mut out = Extraction::new(Self::default());
        let mut packages: Vec<&PackageDeclaration> = Vec::new();

        for declaration in declarations {
            match declaration {
                Declaration::Module(m) => {
                    let root = module_root(&m.evidence.source);
                    let module = module_from_declaration(m, root);
                    out.value.insert(module, &mut out.warnings);
                }
                Declaration::Theme(t) => {
                    let module = theme_from_declaration(t);
                    out.value.insert(module, &mut out.warnings);
                }
                Declaration::Package(p) => packages.push(p),
                _ => {}
            }
        }

        for package in packages {
            let root = parent_dir(&package.evidence.source).to_string();
            let owner = out
                .value
                .modules
                .values_mut()
                .find(|m| m.root == root && m.kind == ModuleKind::Module);
            match owner {
                Some(module) => {
                    module.package = Some(package.name.clone());
                    module.requires = package.require.clone();
                    if !package.namespaces.is_empty() {
                        module.namespaces = package.namespaces.clone();
                    }
                }
                None if package.is_library() => {
                    let module = Module {
                        id: ids::module_id(&package.name),
                        kind: ModuleKind::Library,
                        root,
                        namespaces: package.namespaces.clone(),
                        package: Some(package.name.clone()),
                        sequence: Vec::new(),
                        requires: package.require.clone(),
                        parent_theme: None,
                        scopes: BTreeSet::new(),
                        evidence: package.evidence.clone(),
                    };
                    out.value.insert(module, &mut out.warnings);
                }
                None => debug!("Skipping non-library package {}", package.name),
            }
        }

        out.value.reindex();
        out
    }

    fn insert(&mut self, module: Module, warnings: &mut Vec<Warning>) {
        if let Some(existing) = self.modules.get(&module.id) {
            warnings.push(Warning::invalid_declaration(
                module.evidence.source.clone(),
                format!(
                    "duplicate module {} (already declared in {})",
                    module.id, existing.evidence.source
                ),
            ));
            return;
        }
        self.modules.insert(module.id.clone(), module);
    }

    fn reindex(&mut self) {
        self.roots = self
            .modules
            .values()
            .map(|m| (m.root.clone(), m.id.clone()))
            .collect();
        self.roots
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.cmp(b)));

        self.namespaces = self
            .modules
            .values()
            .flat_map(|m| m.namespaces.iter().map(move |ns| (ns.clone(), m.id.clone())))
            .collect();
        self.namespaces
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.cmp(b)));

        self.packages = self
            .modules
            .values()
            .filter_map(|m| m.package.clone().map(|p| (p, m.id.clone())))
            .collect();
    }

    /// Record that `module` has configuration in `scope`.
    pub fn note_scope(&mut self, module: &str, scope: &str) {
        if let Some(m) = self.modules.get_mut(module) {
            m.scopes.insert(scope.to_string());
        }
    }

    /// Virtual types have no source file; they belong to their declaring module.
    pub fn register_virtual_type(&mut self, name: &str, module: &str) {
        self.virtual_types
            .entry(ids::normalize_type(name))
            .or_insert_with(|| module.to_string());
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_for_package(&self, package: &str) -> Option<&str> {
        self.packages.get(package).map(String::as_str)
    }

    pub fn module_for_locator(&self, locator: &str) -> Option<&str> {
        self.roots
            .iter()
            .find(|(root, _)| {
                root.is_empty()
                    || locator == root
                    || (locator.starts_with(root.as_str())
                        && locator.as_bytes().get(root.len()) == Some(&b'/'))
            })
            .map(|(_, id)| id.as_str())
    }
}

impl ModuleResolver for ModuleIndex {
    fn module_for_path(&self, path: &Path) -> Option<&str> {
        let locator = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.module_for_locator(&locator)
    }

    fn module_for_type(&self, fqcn: &str) -> Option<&str> {
        let fqcn = ids::normalize_type(fqcn);
        if let Some(module) = self.virtual_types.get(&fqcn) {
            return Some(module);
        }
        self.namespaces
            .iter()
            .find(|(prefix, _)| fqcn.starts_with(prefix.as_str()))
            .map(|(_, id)| id.as_str())
    }
}

/// `app/code/Acme/Cart/etc/module.xml` -> `app/code/Acme/Cart`
fn module_root(locator: &str) -> String {
    let etc_dir = parent_dir(locator);
    parent_dir(etc_dir).to_string()
}

fn module_from_declaration(decl: &ModuleDeclaration, root: String) -> Module {
    Module {
        id: decl.name.clone(),
        kind: ModuleKind::Module,
        root,
        namespaces: ids::namespace_for_module(&decl.name).into_iter().collect(),
        package: None,
        sequence: decl.sequence.clone(),
        requires: Vec::new(),
        parent_theme: None,
        scopes: BTreeSet::new(),
        evidence: decl.evidence.clone(),
    }
}

fn theme_from_declaration(decl: &ThemeDeclaration) -> Module {
    Module {
        id: decl.id.clone(),
        kind: ModuleKind::Theme,
        root: parent_dir(&decl.evidence.source).to_string(),
        namespaces: Vec::new(),
        package: None,
        sequence: Vec::new(),
        requires: Vec::new(),
        parent_theme: decl.parent.clone(),
        scopes: BTreeSet::new(),
        evidence: decl.evidence.clone(),
    }
}
