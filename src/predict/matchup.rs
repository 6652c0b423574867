//! Matchup assembly
//!
//! Joins the home and away pre-game snapshots for a game into one feature
//! row. Games where either side has no earlier history are skipped, never
//! imputed.

use chrono::NaiveDate;
use std::path::Path;

use crate::features::{FeatureSchema, FeatureStore, Snapshot};
use crate::{Matchup, Result, TeamId};

/// Home snapshot values followed by away snapshot values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub matchup: Matchup,
    pub as_of: NaiveDate,
    /// 0 = home win, 1 = away win; `None` for unplayed games
    pub label: Option<u8>,
    pub values: Vec<f64>,
}

/// Terminal outcome of resolving a pending matchup
///
/// Resolution is a pure function of the stored history, so neither state
/// is ever retried.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchupState {
    Resolved(FeatureRow),
    Skipped { missing: Vec<TeamId> },
}

pub struct MatchupAssembler<'a> {
    store: &'a FeatureStore,
}

impl<'a> MatchupAssembler<'a> {
    pub fn new(store: &'a FeatureStore) -> Self {
        MatchupAssembler { store }
    }

    /// Resolve a matchup using snapshots dated strictly before `as_of`
    pub fn resolve(&self, matchup: &Matchup, as_of: NaiveDate) -> MatchupState {
        let home = self.store.lookup(&matchup.home_team, as_of);
        let away = self.store.lookup(&matchup.away_team, as_of);
        Self::join(matchup, as_of, home.as_ref(), away.as_ref())
    }

    /// Same as `resolve` without filling the store's lookup cache
    fn resolve_uncached(&self, matchup: &Matchup, as_of: NaiveDate) -> MatchupState {
        let home = self.store.snapshot_before(&matchup.home_team, as_of);
        let away = self.store.snapshot_before(&matchup.away_team, as_of);
        Self::join(matchup, as_of, home, away)
    }

    fn join(
        matchup: &Matchup,
        as_of: NaiveDate,
        home: Option<&Snapshot>,
        away: Option<&Snapshot>,
    ) -> MatchupState {
        match (home, away) {
            (Some(home), Some(away)) => {
                let mut values = home.values.clone();
                values.extend_from_slice(&away.values);
                MatchupState::Resolved(FeatureRow {
                    matchup: matchup.clone(),
                    as_of,
                    label: matchup.label(),
                    values,
                })
            }
            (home, away) => {
                let mut missing = Vec::new();
                if home.is_none() {
                    missing.push(matchup.home_team.clone());
                }
                if away.is_none() {
                    missing.push(matchup.away_team.clone());
                }
                log::debug!("Skipping {}: no history for {:?}", matchup, missing);
                MatchupState::Skipped { missing }
            }
        }
    }

    pub fn build_row(&self, matchup: &Matchup, as_of: NaiveDate) -> Option<FeatureRow> {
        match self.resolve(matchup, as_of) {
            MatchupState::Resolved(row) => Some(row),
            _ => None,
        }
    }

    /// Assemble every matchup as of its own game date
    pub fn build_table(&self, matchups: &[Matchup]) -> FeatureTable {
        let schema = self.store.schema().clone();
        let mut table = FeatureTable {
            columns: schema.matchup_columns(),
            schema,
            rows: Vec::new(),
            skipped: Vec::new(),
        };

        for matchup in matchups {
            match self.resolve_uncached(matchup, matchup.date) {
                MatchupState::Resolved(row) => table.rows.push(row),
                MatchupState::Skipped { missing } => table.skipped.push((matchup.clone(), missing)),
            }
        }

        log::info!(
            "Assembled {} feature rows ({} matchups skipped for missing history)",
            table.rows.len(),
            table.skipped.len()
        );
        table
    }
}

/// Training / evaluation table
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub schema: FeatureSchema,
    /// `home_<stat>...` then `away_<stat>...`
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
    pub skipped: Vec<(Matchup, Vec<TeamId>)>,
}

impl FeatureTable {
    /// Rows with a known result
    pub fn labelled(&self) -> impl Iterator<Item = (&FeatureRow, u8)> {
        self.rows.iter().filter_map(|r| r.label.map(|l| (r, l)))
    }

    /// Write the table and its schema manifest
    ///
    /// Identity columns (`date, home_team, away_team`) are optional; the
    /// `winning_team` label column is empty for unplayed games.
    pub fn write_csv(&self, path: &Path, include_teams: bool) -> Result<usize> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header: Vec<String> = Vec::with_capacity(self.columns.len() + 4);
        if include_teams {
            header.extend(["date", "home_team", "away_team"].map(String::from));
        }
        header.push("winning_team".to_string());
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            if include_teams {
                record.push(row.matchup.date.format("%Y-%m-%d").to_string());
                record.push(row.matchup.home_team.to_string());
                record.push(row.matchup.away_team.to_string());
            }
            record.push(row.label.map(|l| l.to_string()).unwrap_or_default());
            record.extend(row.values.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        self.schema.save(&FeatureSchema::manifest_path(path))?;
        log::info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(self.rows.len())
    }
}
