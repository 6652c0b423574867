//! Aggregation policies
//!
//! Weighting schemes for collapsing a team's prior games into one value per
//! stat column, plus the fixed-precision rounding shared by training and
//! live inference.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How prior games are weighted into a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Plain mean over the last `window` games
    UniformMean,
    /// Weights 1..n over the last `window` games, newest heaviest
    LinearWeighted,
    /// EWMA over the full prior history with span `window`
    Exponential,
}

impl AggregationPolicy {
    pub fn is_windowed(&self) -> bool {
        !matches!(self, AggregationPolicy::Exponential)
    }

    /// Weights for a window of `n` games ordered oldest to newest
    pub fn window_weights(&self, n: usize) -> Vec<f64> {
        match self {
            AggregationPolicy::UniformMean => vec![1.0; n],
            AggregationPolicy::LinearWeighted => (1..=n).map(|k| k as f64).collect(),
            // Not windowed; only meaningful through `ewma_alpha`
            AggregationPolicy::Exponential => vec![1.0; n],
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::UniformMean => write!(f, "uniform_mean"),
            AggregationPolicy::LinearWeighted => write!(f, "linear_weighted"),
            AggregationPolicy::Exponential => write!(f, "exponential"),
        }
    }
}

/// When derived composite stats are computed relative to aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedMode {
    /// Derive per game from raw values, then aggregate the derived column
    PerGame,
    /// Derive from already-aggregated inputs (ratio of averages)
    PostAggregate,
}

impl fmt::Display for DerivedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedMode::PerGame => write!(f, "per_game"),
            DerivedMode::PostAggregate => write!(f, "post_aggregate"),
        }
    }
}

/// EWMA smoothing factor for a span
pub fn ewma_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// `sum(v_k * w_k) / sum(w_k)`, or None for an empty or zero-weight window
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    debug_assert_eq!(values.len(), weights.len());
    let total_weight: f64 = weights.iter().sum();
    if values.is_empty() || total_weight == 0.0 {
        return None;
    }
    let weighted_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(weighted_sum / total_weight)
}

/// Round half away from zero to `precision` decimal places
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
