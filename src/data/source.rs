//! Stats sources
//!
//! A source hands back raw team game logs and schedules. Fetching is the
//! failure-prone edge of the pipeline, so callers wrap it in `with_retry`.

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::data::ingest::{self, IngestBatch};
use crate::data::teams;
use crate::features::StatSpec;
use crate::{GameRecord, HoopError, Matchup, Result, TeamId};

/// Trait for all game-log and schedule providers
pub trait StatsSource {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// One team's completed games for a season (season = year it ends in)
    fn fetch_team_game_log(&self, team: &TeamId, season: u16) -> Result<IngestBatch<GameRecord>>;

    /// Games scheduled on a date
    fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<Matchup>>;
}

/// Retry a source operation with exponential backoff
pub fn with_retry<T, F>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if attempt + 1 < attempts => {
                log::warn!("Attempt {} failed: {}", attempt + 1, e);
                let delay = std::time::Duration::from_millis(100 * 2u64.pow(attempt));
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Offline source backed by exported CSV files
///
/// Layout: `<root>/<season>/<CODE>.csv` per team game log, and
/// `<root>/schedule.csv` for matchups.
pub struct CsvDirectorySource {
    root: PathBuf,
    stats: Vec<StatSpec>,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>, stats: Vec<StatSpec>) -> Self {
        CsvDirectorySource {
            root: root.into(),
            stats,
        }
    }

    fn game_log_path(&self, team: &TeamId, season: u16) -> Result<PathBuf> {
        let franchise =
            teams::find_team(team.as_str()).ok_or_else(|| HoopError::UnknownTeam(team.to_string()))?;
        Ok(self
            .root
            .join(season.to_string())
            .join(format!("{}.csv", franchise.code)))
    }
}

impl StatsSource for CsvDirectorySource {
    fn name(&self) -> &str {
        "csv-directory"
    }

    fn fetch_team_game_log(&self, team: &TeamId, season: u16) -> Result<IngestBatch<GameRecord>> {
        let path = self.game_log_path(team, season)?;
        log::debug!("Reading {} game log from {}", team, path.display());
        let mut batch = ingest::load_game_log(&path, &self.stats)?;

        // Rows for other teams do not belong in this log
        let expected = teams::canonical(team.as_str());
        batch.records.retain(|r| r.team == expected);
        Ok(batch)
    }

    fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<Matchup>> {
        let file = std::fs::File::open(self.root.join("schedule.csv"))?;
        let batch = ingest::parse_schedule(file)?;
        Ok(batch
            .records
            .into_iter()
            .filter(|m| m.date == date)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::StatKind;
    use std::cell::Cell;

    fn source(dir: &std::path::Path) -> CsvDirectorySource {
        CsvDirectorySource::new(dir, vec![StatSpec::new("pts", StatKind::Count)])
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let calls = Cell::new(0);
        let result = with_retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(HoopError::Parse("flaky".into()))
                } else {
                    Ok(42)
                }
            },
            3,
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(HoopError::Parse(format!("failure {}", calls.get())))
            },
            2,
        );
        assert!(matches!(result, Err(HoopError::Parse(msg)) if msg == "failure 2"));
    }

    #[test]
    fn test_directory_game_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2025")).unwrap();
        std::fs::write(
            dir.path().join("2025").join("PHO.csv"),
            "date,team,pts\n2024-10-23,PHO,116\n2024-10-25,Phoenix Suns,bad\n",
        )
        .unwrap();

        let src = source(dir.path());
        let batch = src
            .fetch_team_game_log(&TeamId::from("Phoenix Suns"), 2025)
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.records[0].team, TeamId::from("Phoenix Suns"));

        assert!(matches!(
            src.fetch_team_game_log(&TeamId::from("Nowhere"), 2025),
            Err(HoopError::UnknownTeam(_))
        ));
    }

    #[test]
    fn test_directory_schedule() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("schedule.csv"),
            "date,home_team,away_team\n2024-10-22,BOS,NYK\n2024-10-23,ATL,BRK\n",
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 10, 22).unwrap();
        let games = source(dir.path()).fetch_schedule(day).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].home_team, TeamId::from("Boston Celtics"));
    }
}
