//! Percentile-normalised hotspot scoring
//!
//! Two raw signals per module, change frequency and weighted centrality, are
//! each turned into a percentile rank, combined linearly and then damped:
//!
//! ```text
//! raw    = change_weight × pct(changes) + centrality_weight × pct(centrality)
//! damped = 3·raw² − 2·raw³        (smoothstep on [0, 1])
//! ```
//!
//! Smoothstep is monotonic on [0, 1] and pulls middling scores down, so only
//! modules that rank high on both signals clear the threshold. A module with
//! no changes and no centrality is never flagged, whatever its rank.

use crate::config::HotspotConfig;
use crate::git::ModuleChurn;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub module: String,
    pub change_frequency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
    pub centrality: f64,
    pub change_percentile: f64,
    pub centrality_percentile: f64,
    pub raw_score: f64,
    pub score: f64,
    pub high_risk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotReport {
    /// False when change history could not be gathered; change percentiles are then 0
    pub change_signal_available: bool,
    pub threshold: f64,
    pub high_risk_count: usize,
    /// Ranked by descending damped score
    pub hotspots: Vec<Hotspot>,
}

/// Fraction of `values` that are ≤ `value`; ties share the highest rank.
pub fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let at_or_below = values.iter().filter(|v| **v <= value).count();
    at_or_below as f64 / values.len() as f64
}

pub fn dampen(raw: f64) -> f64 {
    let r = raw.clamp(0.0, 1.0);
    3.0 * r * r - 2.0 * r * r * r
}

/// Rank every module in `centrality`.
///
/// `changes` is `None` when the change-history signal is absent.
pub fn score_hotspots(
    centrality: &BTreeMap<String, f64>,
    changes: Option<&BTreeMap<String, ModuleChurn>>,
    config: &HotspotConfig,
) -> HotspotReport {
    let centrality_values: Vec<f64> = centrality.values().copied().collect();
    let change_values: Vec<f64> = centrality
        .keys()
        .map(|m| change_count(changes, m) as f64)
        .collect();

    let mut hotspots: Vec<Hotspot> = centrality
        .iter()
        .map(|(module, &central)| {
            let change_frequency = change_count(changes, module);
            let change_percentile = if changes.is_some() {
                percentile_rank(&change_values, change_frequency as f64)
            } else {
                0.0
            };
            let centrality_percentile = percentile_rank(&centrality_values, central);
            let raw_score = config.change_weight * change_percentile
                + config.centrality_weight * centrality_percentile;
            let score = dampen(raw_score);
            let has_signal = change_frequency > 0 || central > 0.0;
            Hotspot {
                module: module.clone(),
                change_frequency,
                last_changed: changes
                    .and_then(|c| c.get(module))
                    .and_then(|c| c.last_changed.clone()),
                centrality: central,
                change_percentile,
                centrality_percentile,
                raw_score,
                score,
                high_risk: has_signal && score > config.threshold,
            }
        })
        .collect();
    hotspots.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.module.cmp(&b.module)));

    HotspotReport {
        change_signal_available: changes.is_some(),
        threshold: config.threshold,
        high_risk_count: hotspots.iter().filter(|h| h.high_risk).count(),
        hotspots,
    }
}

fn change_count(changes: Option<&BTreeMap<String, ModuleChurn>>, module: &str) -> usize {
    changes
        .and_then(|c| c.get(module))
        .map(|c| c.commits)
        .unwrap_or(0)
}
