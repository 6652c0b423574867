//! Live inference for scheduled games

use chrono::NaiveDate;

use crate::data::{Database, UpsertReport};
use crate::features::{FeatureSchema, FeatureStore};
use crate::predict::matchup::{MatchupAssembler, MatchupState};
use crate::predict::scorer::Scorer;
use crate::{Matchup, Prediction, Result, TeamId};

/// Predictions for one day plus the games that could not be scored
#[derive(Debug, Default)]
pub struct DayPredictions {
    pub predictions: Vec<Prediction>,
    pub skipped: Vec<(Matchup, Vec<TeamId>)>,
}

/// Scores matchups against the live feature store
pub struct Predictor<S: Scorer> {
    store: FeatureStore,
    scorer: S,
}

impl<S: Scorer> Predictor<S> {
    /// Create a predictor, refusing to run if live features would not line
    /// up with what the scorer was trained on
    pub fn new(store: FeatureStore, scorer: S, trained: &FeatureSchema) -> Result<Self> {
        trained.ensure_compatible(store.schema())?;
        store.schema().ensure_columns(scorer.columns())?;
        Ok(Predictor { store, scorer })
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Refresh features after new records were stored
    pub fn apply_ingest(&mut self, db: &Database, report: &UpsertReport) -> Result<()> {
        self.store.apply_ingest(db, report)
    }

    /// Predict one matchup as of its date; `None` if either side lacks history
    pub fn predict_matchup(&self, matchup: &Matchup) -> Result<Option<Prediction>> {
        match MatchupAssembler::new(&self.store).build_row(matchup, matchup.date) {
            Some(row) => self.score(matchup, &row.values).map(Some),
            None => Ok(None),
        }
    }

    fn score(&self, matchup: &Matchup, values: &[f64]) -> Result<Prediction> {
        let scored = self.scorer.predict(values)?;
        Ok(Prediction {
            date: matchup.date,
            home_team: matchup.home_team.clone(),
            away_team: matchup.away_team.clone(),
            label: scored.label,
            home_win_prob: scored.probabilities[0],
            away_win_prob: scored.probabilities[1],
        })
    }

    /// Predict every game scheduled on `date`
    pub fn predict_day(&self, db: &Database, date: NaiveDate) -> Result<DayPredictions> {
        let assembler = MatchupAssembler::new(&self.store);
        let mut day = DayPredictions::default();

        for matchup in db.matchups_on(date)? {
            match assembler.resolve(&matchup, date) {
                MatchupState::Resolved(row) => {
                    day.predictions.push(self.score(&matchup, &row.values)?);
                }
                MatchupState::Skipped { missing } => {
                    log::warn!("Cannot predict {}: no history for {:?}", matchup, missing);
                    day.skipped.push((matchup, missing));
                }
            }
        }

        log::info!(
            "Predicted {} game(s) on {} ({} skipped)",
            day.predictions.len(),
            date,
            day.skipped.len()
        );
        Ok(day)
    }
}

/// Format a prediction for display
pub fn format_prediction(pred: &Prediction) -> String {
    let (home_pct, away_pct) = pred.percentages();
    let winner_pct = if pred.label == crate::HOME_WIN {
        home_pct
    } else {
        away_pct
    };

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} vs {}  ({})
├─────────────────────────────────────────────────┤
│  Home win:   {:.1}%
│  Away win:   {:.1}%
│  Pick:       {} {:.1}%
└─────────────────────────────────────────────────┘
"#,
        pred.home_team,
        pred.away_team,
        pred.date,
        home_pct,
        away_pct,
        pred.predicted_winner(),
        winner_pct
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureEngine, StatKind, StatSpec};
    use crate::predict::scorer::LogisticScorer;
    use crate::{Config, GameRecord, HoopError, AWAY_WIN};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.features.window = 2;
        config.schema.stats = vec![StatSpec::new("pts", StatKind::Count)];
        config.schema.derived.clear();
        config
    }

    fn scorer() -> LogisticScorer {
        LogisticScorer {
            columns: vec!["home_pts".into(), "away_pts".into()],
            intercept: 0.0,
            coefficients: vec![-0.1, 0.1],
        }
    }

    fn setup() -> (Database, FeatureStore) {
        let db = Database::in_memory().unwrap();
        db.upsert(&[
            GameRecord::new(date("2024-01-01"), TeamId::from("T")).with_stat("pts", 100.0),
            GameRecord::new(date("2024-01-02"), TeamId::from("V")).with_stat("pts", 120.0),
        ])
        .unwrap();
        db.upsert_matchups(&[
            Matchup::scheduled(date("2024-01-06"), TeamId::from("T"), TeamId::from("V")),
            Matchup::scheduled(date("2024-01-06"), TeamId::from("U"), TeamId::from("V")),
        ])
        .unwrap();

        let engine = FeatureEngine::from_config(&config()).unwrap();
        let store = FeatureStore::build(&db, engine).unwrap();
        (db, store)
    }

    #[test]
    fn test_predict_day() {
        let (db, store) = setup();
        let trained = FeatureSchema::from_config(&config()).unwrap();
        let predictor = Predictor::new(store, scorer(), &trained).unwrap();

        let day = predictor.predict_day(&db, date("2024-01-06")).unwrap();
        assert_eq!(day.predictions.len(), 1);
        assert_eq!(day.skipped.len(), 1);
        assert_eq!(day.skipped[0].1, vec![TeamId::from("U")]);

        let pred = &day.predictions[0];
        assert_eq!(pred.label, AWAY_WIN);
        assert_eq!(pred.predicted_winner(), &TeamId::from("V"));
        assert!(pred.away_win_prob > 0.85);

        let card = format_prediction(pred);
        assert!(card.contains("T vs V"));
        assert!(card.contains("Pick:       V"));
    }

    #[test]
    fn test_predict_single_matchup() {
        let (_db, store) = setup();
        let trained = FeatureSchema::from_config(&config()).unwrap();
        let predictor = Predictor::new(store, scorer(), &trained).unwrap();

        let m = Matchup::scheduled(date("2024-01-06"), TeamId::from("V"), TeamId::from("T"));
        let pred = predictor.predict_matchup(&m).unwrap().unwrap();
        assert!(pred.home_win_prob > 0.5);

        let early = Matchup::scheduled(date("2024-01-01"), TeamId::from("T"), TeamId::from("V"));
        assert!(predictor.predict_matchup(&early).unwrap().is_none());
    }

    #[test]
    fn test_ingest_refreshes_live_features() {
        let (db, store) = setup();
        let trained = FeatureSchema::from_config(&config()).unwrap();
        let mut predictor = Predictor::new(store, scorer(), &trained).unwrap();
        assert_eq!(predictor.predict_day(&db, date("2024-01-06")).unwrap().skipped.len(), 1);

        let report = db
            .upsert(&[GameRecord::new(date("2024-01-03"), TeamId::from("U")).with_stat("pts", 90.0)])
            .unwrap();
        predictor.apply_ingest(&db, &report).unwrap();

        let day = predictor.predict_day(&db, date("2024-01-06")).unwrap();
        assert_eq!(day.predictions.len(), 2);
        assert!(day.skipped.is_empty());
    }

    #[test]
    fn test_schema_drift_halts() {
        let (_db, store) = setup();
        let mut trained_config = config();
        trained_config.features.window = 5;
        let trained = FeatureSchema::from_config(&trained_config).unwrap();
        assert!(matches!(
            Predictor::new(store, scorer(), &trained),
            Err(HoopError::SchemaDrift { .. })
        ));
    }

    #[test]
    fn test_scorer_column_mismatch_halts() {
        let (_db, store) = setup();
        let trained = FeatureSchema::from_config(&config()).unwrap();
        let mut wrong = scorer();
        wrong.columns.reverse();
        assert!(matches!(
            Predictor::new(store, wrong, &trained),
            Err(HoopError::SchemaDrift { .. })
        ));
    }
}
