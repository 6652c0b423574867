//! Feature column contract
//!
//! The ordered stat-column list and aggregation settings shared by the
//! training table, the scorer and live inference. Both sides build a
//! `FeatureSchema` from configuration and compare them before scoring.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::features::policy::{AggregationPolicy, DerivedMode};
use crate::{Config, HoopError, Result};

/// Numeric type of a raw stat column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Integer box-score count (points, rebounds, ...)
    Count,
    /// Floating point rate or rating (percentages, ratings, pace)
    Rate,
}

impl StatKind {
    /// Parse one raw cell into a finite value
    pub fn parse_value(&self, raw: &str) -> std::result::Result<f64, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty value".to_string());
        }
        let value = match self {
            StatKind::Count => match raw.parse::<i64>() {
                Ok(v) => v as f64,
                Err(_) => {
                    let v: f64 = raw
                        .parse()
                        .map_err(|_| format!("'{}' is not an integer", raw))?;
                    if v.fract() != 0.0 {
                        return Err(format!("'{}' is not an integer", raw));
                    }
                    v
                }
            },
            StatKind::Rate => raw
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", raw))?,
        };
        if !value.is_finite() {
            return Err(format!("'{}' is not finite", raw));
        }
        Ok(value)
    }
}

/// One configured raw stat column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatSpec {
    pub name: String,
    pub kind: StatKind,
}

impl StatSpec {
    pub fn new(name: &str, kind: StatKind) -> Self {
        StatSpec {
            name: name.to_string(),
            kind,
        }
    }
}

/// Composite stats computed from raw per-game columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStat {
    /// Assists per turnover
    AstToTov,
    /// Offensive rating minus defensive rating
    NetRating,
    /// Turnover rate scaled by pace: estimated turnovers per game
    TovImpact,
}

impl DerivedStat {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedStat::AstToTov => "ast_to_tov",
            DerivedStat::NetRating => "net_rating",
            DerivedStat::TovImpact => "tov_impact",
        }
    }

    /// Raw columns this stat is computed from
    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            DerivedStat::AstToTov => &["ast", "tov"],
            DerivedStat::NetRating => &["ortg", "drtg"],
            DerivedStat::TovImpact => &["tov_pct", "pace"],
        }
    }

    pub fn compute<F>(&self, get: F) -> Option<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            // Zero turnovers: denominator floored at one
            DerivedStat::AstToTov => Some(get("ast")? / get("tov")?.max(1.0)),
            DerivedStat::NetRating => Some(get("ortg")? - get("drtg")?),
            DerivedStat::TovImpact => Some(get("tov_pct")? * get("pace")? / 100.0),
        }
    }
}

/// Versioned feature contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub stats: Vec<StatSpec>,
    pub derived: Vec<DerivedStat>,
    pub policy: AggregationPolicy,
    pub window: usize,
    pub precision: u32,
    pub derived_mode: DerivedMode,
}

impl FeatureSchema {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(FeatureSchema {
            version: config.schema.version,
            stats: config.schema.stats.clone(),
            derived: config.schema.derived.clone(),
            policy: config.features.policy,
            window: config.features.window,
            precision: config.features.precision,
            derived_mode: config.features.derived_mode,
        })
    }

    /// Ordered snapshot columns: raw stats, then derived stats
    pub fn columns(&self) -> Vec<String> {
        self.stats
            .iter()
            .map(|s| s.name.clone())
            .chain(self.derived.iter().map(|d| d.name().to_string()))
            .collect()
    }

    pub fn width(&self) -> usize {
        self.stats.len() + self.derived.len()
    }

    /// Position of a column in the snapshot vector
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.stats
            .iter()
            .position(|s| s.name == column)
            .or_else(|| {
                self.derived
                    .iter()
                    .position(|d| d.name() == column)
                    .map(|i| self.stats.len() + i)
            })
    }

    /// Matchup feature columns: every `home_<stat>` then every `away_<stat>`
    pub fn matchup_columns(&self) -> Vec<String> {
        let columns = self.columns();
        columns
            .iter()
            .map(|c| format!("home_{}", c))
            .chain(columns.iter().map(|c| format!("away_{}", c)))
            .collect()
    }

    /// Fail with `SchemaDrift` unless `other` describes identical features
    pub fn ensure_compatible(&self, other: &FeatureSchema) -> Result<()> {
        if self == other {
            return Ok(());
        }
        let (expected, found) = if self.version != other.version {
            (format!("version {}", self.version), format!("version {}", other.version))
        } else if self.columns() != other.columns() {
            (self.columns().join(","), other.columns().join(","))
        } else {
            (self.to_string(), other.to_string())
        };
        Err(HoopError::SchemaDrift { expected, found })
    }

    /// Check a scorer's expected column order against this schema
    pub fn ensure_columns(&self, columns: &[String]) -> Result<()> {
        let expected = self.matchup_columns();
        if expected.as_slice() != columns {
            return Err(HoopError::SchemaDrift {
                expected: expected.join(","),
                found: columns.join(","),
            });
        }
        Ok(())
    }

    /// Manifest path written next to a feature table
    pub fn manifest_path(table_path: &Path) -> std::path::PathBuf {
        table_path.with_extension("schema.json")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} {}/{} precision={} derived={} ({} columns)",
            self.version,
            self.policy,
            self.window,
            self.precision,
            self.derived_mode,
            self.width()
        )
    }
}
