//! Scoped override resolution
//!
//! - [`ScopeList`]: the ordered scopes and the distinguished global scope
//! - [`ResolutionMap`]: per-scope resolution chains for every override point
//! - [`delegation`]: entry-point chains and cross-scope divergence

pub mod delegation;
mod engine;
mod scopes;

pub use delegation::{
    follow_chain, resolve_entry_points, ChainWalk, DelegationChain, DelegationStep, EntryPoint,
};
pub use engine::{
    OverrideDeclaration, OverrideSet, ResolutionMap, ResolutionStep, ResolutionTarget,
    ScopeResolution, CONTESTED_CONFIDENCE,
};
pub use scopes::ScopeList;
