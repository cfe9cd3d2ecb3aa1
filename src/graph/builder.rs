//! Module-level graph construction
//!
//! Raw edges are produced class by class from source outlines and
//! declarations, then folded into one [`ModuleEdge`] per
//! (from, to, edge type). Unknown endpoints and self-loops are dropped at
//! creation time.

use super::{DependencyGraph, EdgeType, ModuleEdge, RawEdge, SubsetMap};
use crate::declarations::{Declaration, MergedObserver, MergedPlugin};
use crate::models::{ids, Evidence};
use crate::modules::{ModuleIndex, ModuleResolver};
use crate::parsers::{FileOutline, SourceNode, SourceVisitor, Usage, UsageKind};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Edge type produced by a code usage.
pub fn edge_type_for(kind: UsageKind) -> EdgeType {
    match kind {
        UsageKind::Instantiation => EdgeType::Instantiation,
        UsageKind::StaticAccess => EdgeType::StaticAccess,
        UsageKind::Extends => EdgeType::Inheritance,
        UsageKind::Implements => EdgeType::InterfaceImplementation,
        UsageKind::TraitUse => EdgeType::TraitUse,
        UsageKind::ParameterType | UsageKind::ReturnType | UsageKind::PropertyType => {
            EdgeType::TypeHint
        }
        UsageKind::Catch => EdgeType::CatchType,
        UsageKind::InstanceOf => EdgeType::InstanceOf,
    }
}

/// Accumulates raw edges in traversal order.
pub struct GraphBuilder<'a, R: ModuleResolver> {
    resolver: &'a R,
    raw: Vec<RawEdge>,
    dropped_unknown: usize,
}

impl<'a, R: ModuleResolver> GraphBuilder<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self {
            resolver,
            raw: Vec::new(),
            dropped_unknown: 0,
        }
    }

    pub fn raw_edges(&self) -> &[RawEdge] {
        &self.raw
    }

    fn push(
        &mut self,
        from: Option<&str>,
        to: Option<&str>,
        edge_type: EdgeType,
        source_symbol: String,
        target_symbol: String,
        evidence: Evidence,
    ) {
        let (Some(from), Some(to)) = (from, to) else {
            self.dropped_unknown += 1;
            return;
        };
        if from == to {
            return;
        }
        self.raw.push(RawEdge {
            from_module: from.to_string(),
            to_module: to.to_string(),
            edge_type,
            source_symbol,
            target_symbol,
            evidence,
        });
    }

    /// Code edges from one parsed source file.
    pub fn add_outline(&mut self, outline: &FileOutline) {
        let from = self
            .resolver
            .module_for_path(Path::new(&outline.locator))
            .map(String::from);
        let mut visitor = UsageEdges {
            builder: self,
            from: from.as_deref(),
        };
        outline.accept(&mut visitor);
    }

    /// Structural edges declared by the modules themselves.
    pub fn add_module_edges(&mut self, index: &ModuleIndex) {
        for module in index.modules() {
            let from = Some(module.id.as_str());
            for dep in &module.sequence {
                let to = index.get(dep).map(|m| m.id.as_str());
                self.push(
                    from,
                    to,
                    EdgeType::ModuleSequence,
                    module.id.clone(),
                    dep.clone(),
                    module.evidence.clone(),
                );
            }
            for package in &module.requires {
                let to = index.module_for_package(package);
                self.push(
                    from,
                    to,
                    EdgeType::ComposerRequire,
                    module.id.clone(),
                    package.clone(),
                    module.evidence.clone(),
                );
            }
            if let Some(parent) = &module.parent_theme {
                let to = index.get(parent).map(|m| m.id.as_str());
                self.push(
                    from,
                    to,
                    EdgeType::ThemeParent,
                    module.id.clone(),
                    parent.clone(),
                    module.evidence.clone(),
                );
            }
        }
    }

    fn add_type_refs(
        &mut self,
        module: &str,
        edge_type: EdgeType,
        source_symbol: &str,
        types: &[&str],
        evidence: &Evidence,
    ) {
        for ty in types {
            let to = self.resolver.module_for_type(ty).map(String::from);
            self.push(
                Some(module),
                to.as_deref(),
                edge_type,
                source_symbol.to_string(),
                ids::class_id(ty),
                evidence.clone(),
            );
        }
    }

    /// Runtime edges from a DI declaration made by `module`.
    ///
    /// Plugins and observers go through [`Self::add_plugin`] and
    /// [`Self::add_observer`] after merging; other kinds carry no edge.
    pub fn add_declaration(&mut self, module: &str, declaration: &Declaration) {
        let source = ids::module_id(module);
        match declaration {
            Declaration::Preference(p) => self.add_type_refs(
                module,
                EdgeType::DiPreference,
                &source,
                &[p.target.as_str(), p.implementation.as_str()],
                &p.evidence,
            ),
            Declaration::VirtualType(v) => self.add_type_refs(
                module,
                EdgeType::DiVirtualType,
                &source,
                &[v.base_type.as_str()],
                &v.evidence,
            ),
            Declaration::Argument(a) => self.add_type_refs(
                module,
                EdgeType::DiArgument,
                &source,
                &[a.target.as_str(), a.value_type.as_str()],
                &a.evidence,
            ),
            Declaration::Module(_)
            | Declaration::Theme(_)
            | Declaration::Package(_)
            | Declaration::Plugin(_)
            | Declaration::Observer(_)
            | Declaration::Route(_) => {}
        }
    }

    /// Plugin edges from the module naming the plugin class to the target's
    /// module and the plugin class's module.
    pub fn add_plugin(&mut self, plugin: &MergedPlugin) {
        if plugin.disabled {
            return;
        }
        self.add_type_refs(
            &plugin.module,
            EdgeType::Plugin,
            &ids::module_id(&plugin.module),
            &[plugin.target.as_str(), plugin.plugin_type.as_str()],
            &plugin.evidence,
        );
    }

    pub fn add_observer(&mut self, observer: &MergedObserver) {
        if observer.disabled {
            return;
        }
        self.add_type_refs(
            &observer.module,
            EdgeType::EventObserver,
            &ids::module_id(&observer.module),
            &[observer.instance.as_str()],
            &observer.evidence,
        );
    }

    /// Fold raw edges into module edges.
    pub fn build(self, index: &ModuleIndex, subsets: &SubsetMap, max_evidence: usize) -> DependencyGraph {
        debug!(
            "Aggregating {} raw edges ({} dropped as unresolved)",
            self.raw.len(),
            self.dropped_unknown
        );
        let mut graph = aggregate(self.raw, subsets, max_evidence);
        graph.modules = index.ids().map(String::from).collect();
        graph
    }
}

struct UsageEdges<'b, 'a, R: ModuleResolver> {
    builder: &'b mut GraphBuilder<'a, R>,
    from: Option<&'b str>,
}

impl<R: ModuleResolver> SourceVisitor for UsageEdges<'_, '_, R> {
    fn visit(&mut self, file: &FileOutline, node: &SourceNode) {
        match node {
            SourceNode::Usage(usage) => self.usage(file, usage),
            SourceNode::Namespace { .. }
            | SourceNode::Import { .. }
            | SourceNode::TypeDeclaration { .. } => {}
        }
    }
}

impl<R: ModuleResolver> UsageEdges<'_, '_, R> {
    fn usage(&mut self, file: &FileOutline, usage: &Usage) {
        if usage.enclosing_type.as_deref() == Some(usage.type_name.as_str()) {
            return;
        }
        let to = self
            .builder
            .resolver
            .module_for_type(&usage.type_name)
            .map(String::from);
        let source_symbol = match (&usage.enclosing_type, &usage.enclosing_member) {
            (Some(class), Some(member)) => ids::method_id(class, member),
            (Some(class), None) => ids::class_id(class),
            (None, _) => file.locator.clone(),
        };
        let evidence = Evidence::at_lines(
            file.locator.clone(),
            usage.line,
            usage.line,
            format!("{} {}", usage.kind.as_str(), usage.type_name),
        );
        self.builder.push(
            self.from,
            to.as_deref(),
            edge_type_for(usage.kind),
            source_symbol,
            ids::class_id(&usage.type_name),
            evidence,
        );
    }
}

/// Group raw edges by (from, to, type).
///
/// Weight is the group size; evidence keeps the first `max_evidence` raw
/// edges in the order they were produced. Edges are ordered by descending
/// weight, then by key.
pub fn aggregate(raw: Vec<RawEdge>, subsets: &SubsetMap, max_evidence: usize) -> DependencyGraph {
    let mut groups: BTreeMap<(String, String, EdgeType), ModuleEdge> = BTreeMap::new();
    for edge in raw {
        let key = (edge.from_module, edge.to_module, edge.edge_type);
        let entry = groups.entry(key).or_insert_with_key(|(from, to, edge_type)| ModuleEdge {
            from: from.clone(),
            to: to.clone(),
            edge_type: *edge_type,
            subset: subsets.subset_of(*edge_type),
            weight: 0,
            evidence: Vec::new(),
        });
        entry.weight += 1;
        if entry.evidence.len() < max_evidence {
            entry.evidence.push(edge.evidence);
        }
    }

    let mut edges: Vec<ModuleEdge> = groups.into_values().collect();
    edges.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
            .then_with(|| a.edge_type.cmp(&b.edge_type))
    });

    let modules = edges
        .iter()
        .flat_map(|e| [e.from.clone(), e.to.clone()])
        .collect();
    DependencyGraph { modules, edges }
}
