//! Deterministic module load order from sequence dependencies

use super::ModuleIndex;
use crate::errors::{Extraction, Warning};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Kahn's algorithm over `sequence` edges, always taking the smallest ready
/// module ID. Modules stuck in a sequence cycle are appended in ID order with
/// a warning. Sequence entries naming unknown modules are ignored.
pub fn load_order(index: &ModuleIndex) -> Extraction<Vec<String>> {
    let mut out = Extraction::new(Vec::with_capacity(index.len()));
    let mut indegree: BTreeMap<&str, usize> = index.ids().map(|id| (id, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for module in index.modules() {
        let deps: BTreeSet<&str> = module.sequence.iter().map(String::as_str).collect();
        for dep in deps {
            if dep == module.id {
                continue;
            }
            if !index.contains(dep) {
                debug!("{} sequences unknown module {}", module.id, dep);
                continue;
            }
            dependents.entry(dep).or_default().push(module.id.as_str());
            if let Some(d) = indegree.get_mut(module.id.as_str()) {
                *d += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    while let Some(id) = ready.pop_first() {
        out.value.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(dependent) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if out.value.len() < index.len() {
        let placed: BTreeSet<&str> = out.value.iter().map(String::as_str).collect();
        let stuck: Vec<String> = index
            .ids()
            .filter(|id| !placed.contains(id))
            .map(String::from)
            .collect();
        out.warn(Warning::invalid_declaration(
            "etc/module.xml",
            format!("sequence cycle between modules: {}", stuck.join(", ")),
        ));
        out.value.extend(stuck);
    }

    out
}
