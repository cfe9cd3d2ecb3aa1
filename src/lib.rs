//! modgraph - typed dependency graph and scoped override resolution
//!
//! Statically analyzes a modular PHP application and produces an
//! evidence-backed module dependency graph plus derived risk metrics:
//! split coupling, scoped override resolution and delegation chains,
//! plugin execution order with side-effect heuristics, cycles, centrality
//! and change-frequency hotspots.
//!
//! [`pipeline::run_analysis`] runs every stage; [`reporters`] turns the
//! result into the JSON documents.

pub mod cache;
pub mod cli;
pub mod config;
pub mod declarations;
pub mod detectors;
pub mod errors;
pub mod git;
pub mod graph;
pub mod models;
pub mod modules;
pub mod parsers;
pub mod pipeline;
pub mod plugins;
pub mod reporters;
pub mod resolution;
pub mod scoring;
