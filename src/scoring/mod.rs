//! Module-level metrics
//!
//! - [`coupling`]: afferent/efferent coupling and instability per edge subset
//! - [`hotspots`]: percentile-normalised change × centrality risk ranking

pub mod coupling;
pub mod hotspots;

pub use coupling::{compute_coupling, CouplingRecord, CouplingReport, SubsetCoupling};
pub use hotspots::{dampen, percentile_rank, score_hotspots, Hotspot, HotspotReport};
