//! SQLite storage for game records and schedules

use crate::{GameRecord, Matchup, Result, TeamId};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Two ingested records shared a (date, team) key with different stats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub date: NaiveDate,
    pub team: TeamId,
}

/// Outcome of merging one batch into the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Keys overwritten with different values (last write wins)
    pub duplicates: Vec<DuplicateKey>,
    /// Teams whose history changed, sorted
    pub touched_teams: Vec<TeamId>,
}

impl UpsertReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS game_records (
                date TEXT NOT NULL,
                team TEXT NOT NULL,
                stats TEXT NOT NULL,
                ingested_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (date, team)
            );

            CREATE TABLE IF NOT EXISTS schedule (
                date TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                winning_team TEXT,
                PRIMARY KEY (date, home_team, away_team)
            );

            CREATE INDEX IF NOT EXISTS idx_game_records_team ON game_records(team, date);
            CREATE INDEX IF NOT EXISTS idx_schedule_date ON schedule(date);
            "#,
        )?;
        Ok(())
    }

    // ==================== Game Records ====================

    /// Merge a batch of records; on key collision the newest record wins
    pub fn upsert(&self, records: &[GameRecord]) -> Result<UpsertReport> {
        let tx = self.conn.unchecked_transaction()?;
        let mut report = UpsertReport::default();
        let mut touched = BTreeSet::new();

        for record in records {
            let date = record.date.format(DATE_FORMAT).to_string();
            let stats = serde_json::to_string(&record.stats)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT stats FROM game_records WHERE date = ?1 AND team = ?2",
                    params![date, record.team.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(old) if old == stats => {
                    report.unchanged += 1;
                    continue;
                }
                Some(_) => {
                    log::warn!(
                        "Duplicate key ({}, {}) with different stats; keeping the newest",
                        record.date,
                        record.team
                    );
                    report.replaced += 1;
                    report.duplicates.push(DuplicateKey {
                        date: record.date,
                        team: record.team.clone(),
                    });
                }
                None => report.inserted += 1,
            }

            tx.execute(
                r#"
                INSERT INTO game_records (date, team, stats, ingested_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(date, team) DO UPDATE SET
                    stats = excluded.stats,
                    ingested_at = excluded.ingested_at
                "#,
                params![date, record.team.as_str(), stats],
            )?;
            touched.insert(record.team.clone());
        }

        tx.commit()?;
        report.touched_teams = touched.into_iter().collect();

        log::info!(
            "Upserted {} records: {} new, {} replaced, {} unchanged",
            records.len(),
            report.inserted,
            report.replaced,
            report.unchanged
        );
        Ok(report)
    }

    /// Every record for a team, oldest first
    pub fn all_records_for(&self, team: &TeamId) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, team, stats FROM game_records WHERE team = ?1 ORDER BY date",
        )?;
        let records = stmt
            .query_map(params![team.as_str()], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Full iteration over stored records
    pub fn scan(&self) -> Result<Vec<GameRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, team, stats FROM game_records")?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Distinct teams with stored records
    pub fn teams(&self) -> Result<Vec<TeamId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT team FROM game_records ORDER BY team")?;
        let teams = stmt
            .query_map([], |row| Ok(TeamId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    /// Explicit reset: drop every record and scheduled game
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM game_records; DELETE FROM schedule;")?;
        log::warn!("Store reset");
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        let date = parse_date_column(row, 0)?;
        let team: String = row.get(1)?;
        let stats_json: String = row.get(2)?;
        let stats: BTreeMap<String, f64> = serde_json::from_str(&stats_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(GameRecord {
            date,
            team: TeamId(team),
            stats,
        })
    }

    // ==================== Schedule ====================

    /// Insert or update scheduled games; a known result is never erased
    pub fn upsert_matchups(&self, matchups: &[Matchup]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for m in matchups {
            tx.execute(
                r#"
                INSERT INTO schedule (date, home_team, away_team, winning_team)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(date, home_team, away_team) DO UPDATE SET
                    winning_team = COALESCE(excluded.winning_team, winning_team)
                "#,
                params![
                    m.date.format(DATE_FORMAT).to_string(),
                    m.home_team.as_str(),
                    m.away_team.as_str(),
                    m.winning_team.as_ref().map(|t| t.as_str()),
                ],
            )?;
        }
        tx.commit()?;
        Ok(matchups.len())
    }

    /// Games scheduled on one date
    pub fn matchups_on(&self, date: NaiveDate) -> Result<Vec<Matchup>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, winning_team FROM schedule
             WHERE date = ?1 ORDER BY home_team",
        )?;
        let matchups = stmt
            .query_map(
                params![date.format(DATE_FORMAT).to_string()],
                Self::row_to_matchup,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matchups)
    }

    /// Every scheduled game, chronologically
    pub fn all_matchups(&self) -> Result<Vec<Matchup>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, home_team, away_team, winning_team FROM schedule
             ORDER BY date, home_team",
        )?;
        let matchups = stmt
            .query_map([], Self::row_to_matchup)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matchups)
    }

    fn row_to_matchup(row: &rusqlite::Row) -> rusqlite::Result<Matchup> {
        Ok(Matchup {
            date: parse_date_column(row, 0)?,
            home_team: TeamId(row.get(1)?),
            away_team: TeamId(row.get(2)?),
            winning_team: row.get::<_, Option<String>>(3)?.map(TeamId),
        })
    }

    // ==================== Statistics ====================

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let record_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM game_records", [], |row| row.get(0))?;
        let team_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT team) FROM game_records",
            [],
            |row| row.get(0),
        )?;
        let matchup_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM schedule", [], |row| row.get(0))?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM game_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            record_count: record_count as usize,
            team_count: team_count as usize,
            matchup_count: matchup_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

fn parse_date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub record_count: usize,
    pub team_count: usize,
    pub matchup_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn record(team: &str, d: &str, pts: f64) -> GameRecord {
        GameRecord::new(date(d), TeamId::from(team))
            .with_stat("pts", pts)
            .with_stat("fg_pct", 0.481)
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.team_count, 0);
        assert!(stats.earliest_game.is_none());
    }

    #[test]
    fn test_upsert_and_read_back() {
        let db = Database::in_memory().unwrap();
        let report = db
            .upsert(&[
                record("Boston Celtics", "2024-01-03", 120.0),
                record("Boston Celtics", "2024-01-01", 110.0),
                record("Miami Heat", "2024-01-01", 98.0),
            ])
            .unwrap();
        assert_eq!(report.inserted, 3);
        assert!(report.duplicates.is_empty());
        assert_eq!(report.touched_teams.len(), 2);

        let celtics = db.all_records_for(&TeamId::from("Boston Celtics")).unwrap();
        assert_eq!(celtics.len(), 2);
        assert_eq!(celtics[0].date, date("2024-01-01"));
        assert_eq!(celtics[1].stat("pts"), Some(120.0));
        assert_eq!(celtics[1].stat("fg_pct"), Some(0.481));

        assert_eq!(db.scan().unwrap().len(), 3);
        assert_eq!(db.teams().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let batch = vec![
            record("Boston Celtics", "2024-01-01", 110.0),
            record("Miami Heat", "2024-01-01", 98.0),
        ];
        db.upsert(&batch).unwrap();
        let mut first = db.scan().unwrap();

        let report = db.upsert(&batch).unwrap();
        assert_eq!(report.unchanged, 2);
        assert!(!report.changed());
        assert!(report.touched_teams.is_empty());

        let mut second = db.scan().unwrap();
        first.sort_by(|a, b| a.team.cmp(&b.team));
        second.sort_by(|a, b| a.team.cmp(&b.team));
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let db = Database::in_memory().unwrap();
        db.upsert(&[record("Miami Heat", "2024-01-01", 98.0)]).unwrap();

        let report = db
            .upsert(&[
                record("Miami Heat", "2024-01-01", 101.0),
                record("Miami Heat", "2024-01-05", 104.0),
            ])
            .unwrap();
        assert_eq!(report.replaced, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(
            report.duplicates,
            vec![DuplicateKey {
                date: date("2024-01-01"),
                team: TeamId::from("Miami Heat"),
            }]
        );

        let heat = db.all_records_for(&TeamId::from("Miami Heat")).unwrap();
        assert_eq!(heat.len(), 2);
        assert_eq!(heat[0].stat("pts"), Some(101.0));
    }

    #[test]
    fn test_upsert_preserves_absent_keys() {
        let db = Database::in_memory().unwrap();
        db.upsert(&[record("Miami Heat", "2024-01-01", 98.0)]).unwrap();
        db.upsert(&[record("Miami Heat", "2024-01-03", 105.0)]).unwrap();
        assert_eq!(db.all_records_for(&TeamId::from("Miami Heat")).unwrap().len(), 2);
    }

    #[test]
    fn test_reset() {
        let db = Database::in_memory().unwrap();
        db.upsert(&[record("Miami Heat", "2024-01-01", 98.0)]).unwrap();
        db.reset().unwrap();
        assert_eq!(db.get_stats().unwrap().record_count, 0);
    }

    #[test]
    fn test_schedule_keeps_known_result() {
        let db = Database::in_memory().unwrap();
        let home = TeamId::from("Boston Celtics");
        let away = TeamId::from("Miami Heat");

        db.upsert_matchups(&[Matchup::completed(
            date("2024-01-06"),
            home.clone(),
            away.clone(),
            away.clone(),
        )])
        .unwrap();
        db.upsert_matchups(&[Matchup::scheduled(date("2024-01-06"), home.clone(), away.clone())])
            .unwrap();

        let games = db.matchups_on(date("2024-01-06")).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].winning_team, Some(away));
        assert!(db.matchups_on(date("2024-01-07")).unwrap().is_empty());
        assert_eq!(db.get_stats().unwrap().matchup_count, 1);
    }

    #[test]
    fn test_stats_date_range() {
        let db = Database::in_memory().unwrap();
        db.upsert(&[
            record("Miami Heat", "2024-01-01", 98.0),
            record("Miami Heat", "2024-02-01", 98.0),
        ])
        .unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.earliest_game, Some(date("2024-01-01")));
        assert_eq!(stats.latest_game, Some(date("2024-02-01")));
        assert_eq!(stats.team_count, 1);
    }
}
