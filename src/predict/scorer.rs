//! Scoring functions exported by the trainer

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{HoopError, Result, AWAY_WIN, HOME_WIN};

/// Output of one scoring call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub label: u8,
    /// Indexed by label: `[home win, away win]`
    pub probabilities: [f64; 2],
}

/// A trained classifier over matchup feature rows
pub trait Scorer {
    /// Feature columns in the order `predict` expects them
    fn columns(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> Result<Scored>;
}

/// Linear model giving the probability of an away win
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticScorer {
    pub columns: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticScorer {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HoopError::NoModel(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let scorer: LogisticScorer = serde_json::from_str(&content)?;
        if scorer.columns.len() != scorer.coefficients.len() {
            return Err(HoopError::Parse(format!(
                "scorer has {} columns but {} coefficients",
                scorer.columns.len(),
                scorer.coefficients.len()
            )));
        }
        Ok(scorer)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Scorer for LogisticScorer {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn predict(&self, features: &[f64]) -> Result<Scored> {
        if features.len() != self.coefficients.len() {
            return Err(HoopError::SchemaDrift {
                expected: format!("{} features", self.coefficients.len()),
                found: format!("{} features", features.len()),
            });
        }
        let z = self.intercept
            + features
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        let away = sigmoid(z);
        Ok(Scored {
            label: if away > 0.5 { AWAY_WIN } else { HOME_WIN },
            probabilities: [1.0 - away, away],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LogisticScorer {
        LogisticScorer {
            columns: vec!["home_pts".into(), "away_pts".into()],
            intercept: 0.0,
            coefficients: vec![-0.1, 0.1],
        }
    }

    #[test]
    fn test_even_matchup() {
        let scored = scorer().predict(&[100.0, 100.0]).unwrap();
        assert_eq!(scored.probabilities, [0.5, 0.5]);
        assert_eq!(scored.label, HOME_WIN);
    }

    #[test]
    fn test_stronger_away_side() {
        let scored = scorer().predict(&[100.0, 110.0]).unwrap();
        assert_eq!(scored.label, AWAY_WIN);
        assert!((scored.probabilities[1] - sigmoid(1.0)).abs() < 1e-12);
        assert!((scored.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_width_mismatch_is_drift() {
        assert!(matches!(
            scorer().predict(&[100.0]),
            Err(HoopError::SchemaDrift { .. })
        ));
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scorer.json");
        assert!(matches!(
            LogisticScorer::load(&path),
            Err(HoopError::NoModel(_))
        ));

        scorer().save(&path).unwrap();
        assert_eq!(LogisticScorer::load(&path).unwrap(), scorer());

        std::fs::write(
            &path,
            r#"{"columns": ["home_pts"], "intercept": 0.0, "coefficients": [1.0, 2.0]}"#,
        )
        .unwrap();
        assert!(matches!(LogisticScorer::load(&path), Err(HoopError::Parse(_))));
    }
}
