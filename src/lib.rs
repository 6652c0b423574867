//! NBA game prediction from leakage-free team form
//!
//! Completed team game logs are stored, rolled into point-in-time "form"
//! snapshots, and joined into home/away feature rows for a win classifier.

pub mod data;
pub mod features;
pub mod predict;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::features::{AggregationPolicy, DerivedMode, DerivedStat, StatKind, StatSpec};

/// Unique identifier for a team (canonical franchise name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(name: impl Into<String>) -> Self {
        TeamId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamId {
    fn from(name: &str) -> Self {
        TeamId(name.to_string())
    }
}

/// One completed game's statistics for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub date: NaiveDate,
    pub team: TeamId,
    /// Stat name -> value. Counts are stored as whole numbers.
    pub stats: BTreeMap<String, f64>,
}

impl GameRecord {
    pub fn new(date: NaiveDate, team: TeamId) -> Self {
        GameRecord {
            date,
            team,
            stats: BTreeMap::new(),
        }
    }

    /// Builder-style stat setter
    pub fn with_stat(mut self, name: &str, value: f64) -> Self {
        self.stats.insert(name.to_string(), value);
        self
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

/// A scheduled or completed game between two teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    /// Present only for completed games
    pub winning_team: Option<TeamId>,
}

impl Matchup {
    pub fn scheduled(date: NaiveDate, home_team: TeamId, away_team: TeamId) -> Self {
        Matchup {
            date,
            home_team,
            away_team,
            winning_team: None,
        }
    }

    pub fn completed(date: NaiveDate, home_team: TeamId, away_team: TeamId, winner: TeamId) -> Self {
        Matchup {
            date,
            home_team,
            away_team,
            winning_team: Some(winner),
        }
    }

    /// Two-class label: 0 = home team won, 1 = away team won
    pub fn label(&self) -> Option<u8> {
        let winner = self.winning_team.as_ref()?;
        if *winner == self.home_team {
            Some(HOME_WIN)
        } else if *winner == self.away_team {
            Some(AWAY_WIN)
        } else {
            None
        }
    }
}

impl fmt::Display for Matchup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} vs {}", self.date, self.home_team, self.away_team)
    }
}

/// Label value for a home win
pub const HOME_WIN: u8 = 0;
/// Label value for an away win
pub const AWAY_WIN: u8 = 1;

/// Model prediction output for one matchup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    /// Predicted label (0 = home win, 1 = away win)
    pub label: u8,
    pub home_win_prob: f64,
    pub away_win_prob: f64,
}

impl Prediction {
    pub fn predicted_winner(&self) -> &TeamId {
        if self.label == HOME_WIN {
            &self.home_team
        } else {
            &self.away_team
        }
    }

    /// Win percentages rounded to one decimal, as shown on game cards
    pub fn percentages(&self) -> (f64, f64) {
        (
            (self.home_win_prob * 1000.0).round() / 10.0,
            (self.away_win_prob * 1000.0).round() / 10.0,
        )
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopError {
    #[error("No history for {team} before {as_of}")]
    MissingHistory { team: TeamId, as_of: NaiveDate },

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Feature schema drift: expected {expected}, found {found}")]
    SchemaDrift { expected: String, found: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown feature column: {0}")]
    UnknownColumn(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("No scoring model at {0} - export one from the trainer first")]
    NoModel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl HoopError {
    /// Errors that skip one row or lookup without aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HoopError::MissingHistory { .. } | HoopError::MalformedRecord { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HoopError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub schema: SchemaConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub policy: AggregationPolicy,
    /// Rolling window length, or EWMA span for the exponential policy
    pub window: usize,
    /// Decimal places every emitted feature is rounded to
    pub precision: u32,
    pub derived_mode: DerivedMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub version: u32,
    #[serde(default)]
    pub derived: Vec<DerivedStat>,
    pub stats: Vec<StatSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub feature_table_path: String,
    pub model_path: String,
    pub source_dir: String,
}

/// Largest supported rounding precision (decimal places)
pub const MAX_PRECISION: u32 = 10;

/// Basic and advanced columns of a team game log
const DEFAULT_STATS: &[(&str, StatKind)] = &[
    ("pts", StatKind::Count),
    ("fg", StatKind::Count),
    ("fga", StatKind::Count),
    ("fg_pct", StatKind::Rate),
    ("fg3", StatKind::Count),
    ("fg3a", StatKind::Count),
    ("fg3_pct", StatKind::Rate),
    ("ft", StatKind::Count),
    ("fta", StatKind::Count),
    ("ft_pct", StatKind::Rate),
    ("orb", StatKind::Count),
    ("drb", StatKind::Count),
    ("trb", StatKind::Count),
    ("ast", StatKind::Count),
    ("stl", StatKind::Count),
    ("blk", StatKind::Count),
    ("tov", StatKind::Count),
    ("pf", StatKind::Count),
    ("ortg", StatKind::Rate),
    ("drtg", StatKind::Rate),
    ("pace", StatKind::Rate),
    ("ts", StatKind::Rate),
    ("ast_pct", StatKind::Rate),
    ("stl_pct", StatKind::Rate),
    ("blk_pct", StatKind::Rate),
    ("efg_pct", StatKind::Rate),
    ("tov_pct", StatKind::Rate),
    ("orb_pct", StatKind::Rate),
    ("ft_rate", StatKind::Rate),
];

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig {
                policy: AggregationPolicy::UniformMean,
                window: 25,
                precision: 2,
                derived_mode: DerivedMode::PerGame,
            },
            schema: SchemaConfig {
                version: 1,
                derived: vec![
                    DerivedStat::AstToTov,
                    DerivedStat::NetRating,
                    DerivedStat::TovImpact,
                ],
                stats: DEFAULT_STATS
                    .iter()
                    .map(|(name, kind)| StatSpec::new(name, *kind))
                    .collect(),
            },
            data: DataConfig {
                database_path: "data/hoopcast.db".to_string(),
                feature_table_path: "data/dataset.csv".to_string(),
                model_path: "model/scorer.json".to_string(),
                source_dir: "data/source".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| HoopError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the feature engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.features.window == 0 {
            return Err(HoopError::Config("features.window must be at least 1".into()));
        }
        if self.features.precision > MAX_PRECISION {
            return Err(HoopError::Config(format!(
                "features.precision must be at most {}",
                MAX_PRECISION
            )));
        }
        if self.schema.stats.is_empty() {
            return Err(HoopError::Config("schema.stats must not be empty".into()));
        }

        let mut seen = HashSet::new();
        let names = self
            .schema
            .stats
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.schema.derived.iter().map(|d| d.name()));
        for name in names {
            if name == "date" || name == "team" {
                return Err(HoopError::Config(format!("'{}' is reserved", name)));
            }
            if !seen.insert(name) {
                return Err(HoopError::Config(format!("duplicate stat column '{}'", name)));
            }
        }

        for derived in &self.schema.derived {
            for input in derived.inputs() {
                if !self.schema.stats.iter().any(|s| s.name == *input) {
                    return Err(HoopError::Config(format!(
                        "derived stat '{}' needs '{}' in schema.stats",
                        derived.name(),
                        input
                    )));
                }
            }
        }
        Ok(())
    }
}
