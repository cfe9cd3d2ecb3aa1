//! Plugin (interceptor) execution order and side-effect analysis
//!
//! - [`side_effects`]: pluggable heuristics over interceptor bodies
//! - [`seam`]: groups merged plugin declarations into seams and reconstructs
//!   the nested invocation sequence

pub mod seam;
pub mod side_effects;

pub use seam::{analyze_seams, ExecutionStep, Interceptor, PluginSeam, RiskLevel};
pub use side_effects::{InterceptorKind, RegexHeuristics, SideEffect, SideEffectHeuristics, SideEffectKind};

use crate::parsers::{FileOutline, TypeOutline};
use std::collections::BTreeMap;

/// Scanned types by fully-qualified name, with the file each came from.
#[derive(Debug, Default)]
pub struct ClassIndex<'a> {
    types: BTreeMap<String, (&'a str, &'a TypeOutline)>,
}

impl<'a> ClassIndex<'a> {
    /// First declaration of a name wins; outlines are expected in path order.
    pub fn build(outlines: impl IntoIterator<Item = &'a FileOutline>) -> Self {
        let mut types = BTreeMap::new();
        for outline in outlines {
            for ty in &outline.types {
                types
                    .entry(ty.name.to_ascii_lowercase())
                    .or_insert((outline.locator.as_str(), ty));
            }
        }
        Self { types }
    }

    /// Case-insensitive lookup, since PHP class names are.
    pub fn get(&self, fqcn: &str) -> Option<(&'a str, &'a TypeOutline)> {
        self.types
            .get(&crate::models::ids::normalize_type(fqcn).to_ascii_lowercase())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
