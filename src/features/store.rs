//! Feature store
//!
//! Point-in-time lookup `(team, as_of) -> Snapshot` shared by training-set
//! construction and live inference. Lookups are cached; the cache for a team
//! is dropped whenever new records for that team are ingested.

use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

use crate::data::database::{Database, UpsertReport};
use crate::features::engine::{FeatureEngine, Snapshot};
use crate::features::schema::FeatureSchema;
use crate::{GameRecord, HoopError, Result, TeamId};

type CacheKey = (TeamId, NaiveDate);

pub struct FeatureStore {
    engine: FeatureEngine,
    /// Per-team snapshot sequences, oldest first
    snapshots: HashMap<TeamId, Vec<Snapshot>>,
    cache: RwLock<HashMap<CacheKey, Option<Snapshot>>>,
}

impl FeatureStore {
    /// Empty store (no teams have history)
    pub fn new(engine: FeatureEngine) -> Self {
        FeatureStore {
            engine,
            snapshots: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Compute every team's snapshots from a full store scan
    pub fn build(db: &Database, engine: FeatureEngine) -> Result<Self> {
        let records = db.scan()?;
        Ok(Self::from_records(records, engine))
    }

    pub fn from_records(records: Vec<GameRecord>, engine: FeatureEngine) -> Self {
        let snapshots = engine.compute_all(records);
        FeatureStore {
            engine,
            snapshots,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.engine.schema()
    }

    /// Teams with at least one snapshot, sorted
    pub fn teams(&self) -> Vec<TeamId> {
        let mut teams: Vec<TeamId> = self.snapshots.keys().cloned().collect();
        teams.sort();
        teams
    }

    /// A team's snapshot sequence, oldest first
    pub fn history(&self, team: &TeamId) -> &[Snapshot] {
        self.snapshots.get(team).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most recent snapshot dated strictly before `as_of`, bypassing the cache
    pub fn snapshot_before(&self, team: &TeamId, as_of: NaiveDate) -> Option<&Snapshot> {
        let history = self.history(team);
        let idx = history.partition_point(|s| s.as_of < as_of);
        idx.checked_sub(1).map(|i| &history[i])
    }

    /// Cached `snapshot_before` for repeated live queries
    ///
    /// Every query is cached, misses included. Batch passes over many dates
    /// should call `snapshot_before` instead.
    pub fn lookup(&self, team: &TeamId, as_of: NaiveDate) -> Option<Snapshot> {
        let key = (team.clone(), as_of);
        if let Some(hit) = self.cache.read().get(&key) {
            return hit.clone();
        }

        let found = self.snapshot_before(team, as_of).cloned();
        self.cache.write().insert(key, found.clone());
        found
    }

    /// One stat's values for the last `limit` snapshots before `before`, oldest first
    pub fn stat_history(
        &self,
        team: &TeamId,
        stat: &str,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let schema = self.schema();
        if schema.index_of(stat).is_none() {
            return Err(HoopError::UnknownColumn(stat.to_string()));
        }
        let history = self.history(team);
        let end = history.partition_point(|s| s.as_of < before);
        Ok(history[end.saturating_sub(limit)..end]
            .iter()
            .filter_map(|s| s.get(schema, stat).map(|v| (s.as_of, v)))
            .collect())
    }

    /// Live query: ordered stat names and values, or `MissingHistory`
    pub fn query(&self, team: &TeamId, as_of: NaiveDate) -> Result<(Vec<String>, Vec<f64>)> {
        let snapshot = self.lookup(team, as_of).ok_or_else(|| HoopError::MissingHistory {
            team: team.clone(),
            as_of,
        })?;
        Ok((self.schema().columns(), snapshot.values))
    }

    /// Drop cached lookups for one team
    pub fn invalidate_team(&mut self, team: &TeamId) {
        self.cache.get_mut().retain(|(t, _), _| t != team);
    }

    /// Recompute teams touched by an ingest and invalidate their cache entries
    pub fn apply_ingest(&mut self, db: &Database, report: &UpsertReport) -> Result<()> {
        if !report.changed() {
            log::debug!("Ingest changed nothing; features kept");
            return Ok(());
        }
        for team in &report.touched_teams {
            let records = db.all_records_for(team)?;
            let snaps = self.engine.compute_team(team, records);
            if snaps.is_empty() {
                self.snapshots.remove(team);
            } else {
                self.snapshots.insert(team.clone(), snaps);
            }
            self.invalidate_team(team);
        }
        log::info!(
            "Refreshed features for {} team(s) after ingest",
            report.touched_teams.len()
        );
        Ok(())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Write every snapshot as `date, team, <columns>`, ordered by team then date
    pub fn export_snapshots(&self, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["date".to_string(), "team".to_string()];
        header.extend(self.schema().columns());
        writer.write_record(&header)?;

        let mut count = 0;
        for team in self.teams() {
            for snap in self.history(&team) {
                let mut row = vec![snap.as_of.format("%Y-%m-%d").to_string(), team.to_string()];
                row.extend(snap.values.iter().map(|v| v.to_string()));
                writer.write_record(&row)?;
                count += 1;
            }
        }
        writer.flush()?;
        log::info!("Exported {} snapshots to {}", count, path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::schema::{StatKind, StatSpec};
    use crate::Config;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn engine(window: usize) -> FeatureEngine {
        let mut config = Config::default();
        config.features.window = window;
        config.schema.stats = vec![StatSpec::new("pts", StatKind::Count)];
        config.schema.derived.clear();
        FeatureEngine::from_config(&config).unwrap()
    }

    fn game(team: &str, d: &str, pts: f64) -> GameRecord {
        GameRecord::new(date(d), TeamId::from(team)).with_stat("pts", pts)
    }

    fn scenario() -> Vec<GameRecord> {
        vec![
            game("T", "2024-01-01", 100.0),
            game("T", "2024-01-03", 90.0),
            game("T", "2024-01-05", 110.0),
        ]
    }

    #[test]
    fn test_lookup_is_strictly_before() {
        let store = FeatureStore::from_records(scenario(), engine(2));
        let t = TeamId::from("T");

        assert!(store.lookup(&t, date("2024-01-01")).is_none());

        // Same-day snapshot is never used for its own date
        let snap = store.lookup(&t, date("2024-01-03")).unwrap();
        assert_eq!(snap.as_of, date("2024-01-01"));

        let snap = store.lookup(&t, date("2024-01-06")).unwrap();
        assert_eq!(snap.as_of, date("2024-01-05"));
        assert_eq!(snap.values, vec![95.0]);
    }

    #[test]
    fn test_query_missing_history() {
        let store = FeatureStore::from_records(scenario(), engine(2));
        let err = store.query(&TeamId::from("U"), date("2024-01-06")).unwrap_err();
        assert!(matches!(err, HoopError::MissingHistory { .. }));
        assert!(err.is_recoverable());

        let (names, values) = store.query(&TeamId::from("T"), date("2024-01-04")).unwrap();
        assert_eq!(names, vec!["pts"]);
        assert_eq!(values, vec![100.0]);
    }

    #[test]
    fn test_lookups_are_cached() {
        let store = FeatureStore::from_records(scenario(), engine(2));
        let t = TeamId::from("T");
        assert_eq!(store.cache_len(), 0);

        let first = store.lookup(&t, date("2024-01-06"));
        let second = store.lookup(&t, date("2024-01-06"));
        assert_eq!(first, second);
        assert_eq!(store.cache_len(), 1);

        store.lookup(&TeamId::from("U"), date("2024-01-06"));
        assert_eq!(store.cache_len(), 2);
    }

    #[test]
    fn test_ingest_invalidates_team() {
        let db = Database::in_memory().unwrap();
        db.upsert(&scenario()).unwrap();

        let mut store = FeatureStore::build(&db, engine(2)).unwrap();
        let t = TeamId::from("T");
        let before = store.lookup(&t, date("2024-01-10")).unwrap();
        assert_eq!(before.as_of, date("2024-01-05"));

        let report = db.upsert(&[game("T", "2024-01-07", 130.0)]).unwrap();
        store.apply_ingest(&db, &report).unwrap();
        assert_eq!(store.cache_len(), 0);

        let after = store.lookup(&t, date("2024-01-10")).unwrap();
        assert_eq!(after.as_of, date("2024-01-07"));
        // mean of 90 and 110
        assert_eq!(after.values, vec![100.0]);
    }

    #[test]
    fn test_ingest_keeps_other_teams_cached() {
        let db = Database::in_memory().unwrap();
        db.upsert(&scenario()).unwrap();
        db.upsert(&[game("U", "2024-01-02", 120.0)]).unwrap();

        let mut store = FeatureStore::build(&db, engine(2)).unwrap();
        store.lookup(&TeamId::from("T"), date("2024-01-10"));
        store.lookup(&TeamId::from("U"), date("2024-01-10"));
        assert_eq!(store.cache_len(), 2);

        let report = db.upsert(&[game("U", "2024-01-04", 100.0)]).unwrap();
        store.apply_ingest(&db, &report).unwrap();
        assert_eq!(store.cache_len(), 1);
    }

    #[test]
    fn test_unchanged_ingest_keeps_cache() {
        let db = Database::in_memory().unwrap();
        db.upsert(&scenario()).unwrap();
        let mut store = FeatureStore::build(&db, engine(2)).unwrap();
        store.lookup(&TeamId::from("T"), date("2024-01-10"));

        let report = db.upsert(&scenario()).unwrap();
        store.apply_ingest(&db, &report).unwrap();
        assert_eq!(store.cache_len(), 1);
    }

    #[test]
    fn test_snapshot_before_skips_cache() {
        let store = FeatureStore::from_records(scenario(), engine(2));
        let t = TeamId::from("T");
        let snap = store.snapshot_before(&t, date("2024-01-05")).unwrap();
        assert_eq!(snap.as_of, date("2024-01-03"));
        assert!(store.snapshot_before(&t, date("2024-01-01")).is_none());
        assert_eq!(store.cache_len(), 0);
    }

    #[test]
    fn test_stat_history() {
        let store = FeatureStore::from_records(scenario(), engine(2));
        let t = TeamId::from("T");

        let recent = store.stat_history(&t, "pts", date("2024-01-06"), 2).unwrap();
        assert_eq!(
            recent,
            vec![(date("2024-01-03"), 100.0), (date("2024-01-05"), 95.0)]
        );

        let before = store.stat_history(&t, "pts", date("2024-01-05"), 25).unwrap();
        assert_eq!(before.len(), 2);
        assert!(store.stat_history(&TeamId::from("U"), "pts", date("2024-01-06"), 5).unwrap().is_empty());
        assert!(matches!(
            store.stat_history(&t, "reb", date("2024-01-06"), 5),
            Err(HoopError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_export_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("averages.csv");

        let store = FeatureStore::from_records(scenario(), engine(2));
        assert_eq!(store.export_snapshots(&path).unwrap(), 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "date,team,pts");
        assert_eq!(lines[3], "2024-01-05,T,95");
    }
}
