//! Temporal feature engine
//!
//! Rolls each team's completed games into pre-game "form" snapshots. The
//! snapshot attached to a team's i-th game is computed from games `0..i` of
//! that same team only, so it is safe to use for any strictly later date.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::features::policy::{ewma_alpha, round_to, weighted_mean, DerivedMode};
use crate::features::schema::FeatureSchema;
use crate::{Config, GameRecord, Result, TeamId};

/// Point-in-time form vector for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub team: TeamId,
    /// Date of the game this snapshot precedes
    pub as_of: NaiveDate,
    /// One value per schema column, already rounded
    pub values: Vec<f64>,
}

impl Snapshot {
    /// Value of a named column
    pub fn get(&self, schema: &FeatureSchema, column: &str) -> Option<f64> {
        schema.index_of(column).and_then(|i| self.values.get(i).copied())
    }
}

/// One game reduced to a column-ordered row
struct GameRow {
    date: NaiveDate,
    values: Vec<f64>,
}

/// Computes snapshot sequences under one aggregation policy
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    schema: FeatureSchema,
}

impl FeatureEngine {
    pub fn new(schema: FeatureSchema) -> Self {
        FeatureEngine { schema }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(FeatureSchema::from_config(config)?))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Compute snapshots for every team in the batch
    ///
    /// Teams are independent and processed in parallel.
    pub fn compute_all(&self, records: Vec<GameRecord>) -> HashMap<TeamId, Vec<Snapshot>> {
        let total = records.len();
        let mut by_team: HashMap<TeamId, Vec<GameRecord>> = HashMap::new();
        for record in records {
            by_team.entry(record.team.clone()).or_default().push(record);
        }

        let snapshots: HashMap<TeamId, Vec<Snapshot>> = by_team
            .into_par_iter()
            .map(|(team, games)| {
                let snaps = self.compute_team(&team, games);
                (team, snaps)
            })
            .collect();

        log::info!(
            "Computed {} snapshots for {} teams from {} records ({})",
            snapshots.values().map(Vec::len).sum::<usize>(),
            snapshots.len(),
            total,
            self.schema
        );
        snapshots
    }

    /// Compute one team's snapshot sequence, oldest first
    pub fn compute_team(&self, team: &TeamId, mut games: Vec<GameRecord>) -> Vec<Snapshot> {
        games.retain(|g| &g.team == team);
        games.sort_by_key(|g| g.date);

        for pair in games.windows(2) {
            if pair[0].date == pair[1].date {
                log::warn!(
                    "Data anomaly: {} has two games on {}; keeping both",
                    team,
                    pair[0].date
                );
            }
        }

        let rows: Vec<GameRow> = games
            .iter()
            .filter_map(|g| match self.raw_row(g) {
                Ok(values) => Some(GameRow {
                    date: g.date,
                    values,
                }),
                Err(reason) => {
                    log::warn!("Skipping {} on {}: {}", team, g.date, reason);
                    None
                }
            })
            .collect();

        let aggregated = if self.schema.policy.is_windowed() {
            self.rolling(&rows)
        } else {
            self.exponential(&rows)
        };

        log::debug!("{}: {} snapshots", team, aggregated.len());

        rows.iter()
            .zip(aggregated)
            .map(|(row, values)| Snapshot {
                team: team.clone(),
                as_of: row.date,
                values: values
                    .into_iter()
                    .map(|v| round_to(v, self.schema.precision))
                    .collect(),
            })
            .collect()
    }

    /// Number of rows dated strictly before row `i`
    fn prior_len(rows: &[GameRow], i: usize) -> usize {
        rows.partition_point(|r| r.date < rows[i].date)
    }

    /// Bounded window over the last `window` games dated before each row
    fn rolling(&self, rows: &[GameRow]) -> Vec<Vec<f64>> {
        let window = self.schema.window;
        let mut out = Vec::with_capacity(rows.len());

        for i in 0..rows.len() {
            let end = Self::prior_len(rows, i);
            if end == 0 {
                // First date: no prior data, the snapshot is the game itself
                out.push(rows[i].values.clone());
                continue;
            }

            let prior = &rows[end.saturating_sub(window)..end];
            let mut values = self
                .aggregate_window(prior)
                .unwrap_or_else(|| rows[end - 1].values.clone());
            if self.schema.derived_mode == DerivedMode::PostAggregate {
                self.rederive(&mut values);
            }
            out.push(values);
        }
        out
    }

    /// EWMA over the full prior history, seeded with the first game
    fn exponential(&self, rows: &[GameRow]) -> Vec<Vec<f64>> {
        let alpha = ewma_alpha(self.schema.window);
        let mut out = Vec::with_capacity(rows.len());
        // Unrounded EWMA over rows[..folded]
        let mut state: Option<Vec<f64>> = None;
        let mut folded = 0;

        for i in 0..rows.len() {
            let end = Self::prior_len(rows, i);
            while folded < end {
                let raw = &rows[folded].values;
                state = Some(match state.take() {
                    None => raw.clone(),
                    Some(prev) => prev
                        .iter()
                        .zip(raw)
                        .map(|(s, r)| s * (1.0 - alpha) + r * alpha)
                        .collect(),
                });
                folded += 1;
            }

            let values = match &state {
                Some(current) if end > 0 => {
                    let mut values = current.clone();
                    if self.schema.derived_mode == DerivedMode::PostAggregate {
                        self.rederive(&mut values);
                    }
                    values
                }
                _ => rows[i].values.clone(),
            };
            out.push(values);
        }
        out
    }

    /// Weighted mean of each column over the prior-games window
    fn aggregate_window(&self, prior: &[GameRow]) -> Option<Vec<f64>> {
        if prior.is_empty() {
            return None;
        }
        let weights = self.schema.policy.window_weights(prior.len());
        (0..self.schema.width())
            .map(|col| {
                let column: Vec<f64> = prior.iter().map(|r| r.values[col]).collect();
                weighted_mean(&column, &weights)
            })
            .collect()
    }

    /// Column-ordered raw values, with derived stats computed per game
    fn raw_row(&self, record: &GameRecord) -> std::result::Result<Vec<f64>, String> {
        let mut row = Vec::with_capacity(self.schema.width());
        for spec in &self.schema.stats {
            let value = record
                .stat(&spec.name)
                .ok_or_else(|| format!("missing stat '{}'", spec.name))?;
            row.push(value);
        }
        for derived in &self.schema.derived {
            let value = derived
                .compute(|name| self.base_value(&row, name))
                .ok_or_else(|| format!("cannot derive '{}'", derived.name()))?;
            row.push(value);
        }
        Ok(row)
    }

    /// Replace derived columns with values computed from aggregated inputs
    fn rederive(&self, values: &mut [f64]) {
        let base = self.schema.stats.len();
        for (i, derived) in self.schema.derived.iter().enumerate() {
            if let Some(v) = derived.compute(|name| self.base_value(&values[..base], name)) {
                values[base + i] = v;
            }
        }
    }

    fn base_value(&self, row: &[f64], name: &str) -> Option<f64> {
        self.schema
            .stats
            .iter()
            .position(|s| s.name == name)
            .and_then(|i| row.get(i).copied())
    }
}
