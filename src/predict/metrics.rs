//! Evaluation metrics

use std::fmt;

use crate::predict::matchup::FeatureTable;
use crate::predict::scorer::{Scored, Scorer};
use crate::Result;

/// Clamp for probabilities inside the log loss
const EPS: f64 = 1e-15;

/// Metrics accumulated over labelled matchups
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Number of correct winner predictions
    pub correct: usize,
    /// Total predictions
    pub total: usize,
    /// Sum of per-row negative log likelihood
    pub log_loss_sum: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with one scored row
    pub fn update(&mut self, label: u8, scored: &Scored) {
        if scored.label == label {
            self.correct += 1;
        }
        let p = scored.probabilities[label as usize].clamp(EPS, 1.0 - EPS);
        self.log_loss_sum -= p.ln();
        self.total += 1;
    }

    /// Score every labelled row of a table
    pub fn evaluate<S: Scorer>(scorer: &S, table: &FeatureTable) -> Result<Self> {
        table.schema.ensure_columns(scorer.columns())?;
        let mut metrics = Metrics::new();
        for (row, label) in table.labelled() {
            let scored = scorer.predict(&row.values)?;
            metrics.update(label, &scored);
        }
        Ok(metrics)
    }

    /// Get winner prediction accuracy
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Mean binary cross-entropy
    pub fn log_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.log_loss_sum / self.total as f64
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acc: {:.2}% ({}/{}) | Log loss: {:.4}",
            self.accuracy() * 100.0,
            self.correct,
            self.total,
            self.log_loss()
        )
    }
}
