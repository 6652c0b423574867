//! Prediction and evaluation
//!
//! Assemble matchup feature rows and score them with an exported model.

pub mod analysis;
pub mod matchup;
pub mod metrics;
pub mod predictor;
pub mod scorer;

pub use analysis::{feature_correlations, label_correlations, pearson, Correlation};
pub use matchup::{FeatureRow, FeatureTable, MatchupAssembler, MatchupState};
pub use metrics::Metrics;
pub use predictor::{format_prediction, DayPredictions, Predictor};
pub use scorer::{LogisticScorer, Scored, Scorer};
