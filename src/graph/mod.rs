//! Typed module dependency graph
//!
//! [`builder`] turns source outlines and declarations into raw edges and
//! aggregates them; [`types`] holds the edge taxonomy and graph records.

pub mod builder;
mod types;

pub use builder::{aggregate, edge_type_for, GraphBuilder};
pub use types::{DependencyGraph, EdgeSubset, EdgeType, ModuleEdge, RawEdge, SubsetMap};
