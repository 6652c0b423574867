//! CSV ingestion for game logs and schedules
//!
//! Bad rows are rejected one at a time as `MalformedRecord`; the rest of the
//! file is still loaded.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::data::teams;
use crate::features::StatSpec;
use crate::{GameRecord, HoopError, Matchup, Result, TeamId};

/// One CSV row keyed by lower-cased header
pub type RawRow = BTreeMap<String, String>;

/// Parsed items plus the rows that were turned away
#[derive(Debug)]
pub struct IngestBatch<T> {
    pub records: Vec<T>,
    pub rejected: Vec<HoopError>,
}

impl<T> IngestBatch<T> {
    fn new() -> Self {
        IngestBatch {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }

    fn reject(&mut self, err: HoopError) {
        log::warn!("Rejected row: {}", err);
        self.rejected.push(err);
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%a %b %d %Y", "%a, %b %d, %Y", "%m/%d/%Y"];

/// Parse an ISO date or one of the basketball-reference display formats
pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("unparsable date '{}'", raw))
}

fn malformed(line: usize, reason: impl Into<String>) -> HoopError {
    HoopError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

fn record_line(record: &StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

fn error_line(err: &csv::Error) -> usize {
    err.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn to_raw_row(headers: &[String], record: &StringRecord) -> RawRow {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), v.trim().to_string()))
        .collect()
}

/// Read every row of a headed CSV; unreadable rows come back as errors
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<std::result::Result<(usize, RawRow), HoopError>>> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_lowercase()).collect();

    let rows = rdr
        .records()
        .enumerate()
        .map(|(idx, rec)| match rec {
            Ok(rec) => Ok((record_line(&rec, idx + 2), to_raw_row(&headers, &rec))),
            Err(e) => Err(malformed(error_line(&e), e.to_string())),
        })
        .collect();
    Ok(rows)
}

fn required<'a>(row: &'a RawRow, line: usize, column: &str) -> Result<&'a str> {
    match row.get(column).map(String::as_str) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(malformed(line, format!("missing required column '{}'", column))),
    }
}

/// Convert one `{date, team, <stats>}` row into a record; extra columns are ignored
pub fn parse_game_row(row: &RawRow, line: usize, stats: &[StatSpec]) -> Result<GameRecord> {
    let date = parse_date(required(row, line, "date")?).map_err(|e| malformed(line, e))?;
    let team = teams::canonical(required(row, line, "team")?);

    let mut record = GameRecord::new(date, team);
    for spec in stats {
        let raw = required(row, line, &spec.name)?;
        let value = spec
            .kind
            .parse_value(raw)
            .map_err(|e| malformed(line, format!("{}: {}", spec.name, e)))?;
        record.stats.insert(spec.name.clone(), value);
    }
    Ok(record)
}

/// Parse a game-log CSV
pub fn parse_game_log<R: Read>(reader: R, stats: &[StatSpec]) -> Result<IngestBatch<GameRecord>> {
    let mut batch = IngestBatch::new();
    for row in read_rows(reader)? {
        match row.and_then(|(line, row)| parse_game_row(&row, line, stats)) {
            Ok(record) => batch.records.push(record),
            Err(e) => batch.reject(e),
        }
    }
    log::info!(
        "Parsed {} game records ({} rejected)",
        batch.records.len(),
        batch.rejected.len()
    );
    Ok(batch)
}

pub fn load_game_log(path: &Path, stats: &[StatSpec]) -> Result<IngestBatch<GameRecord>> {
    let file = std::fs::File::open(path)?;
    parse_game_log(file, stats)
}

fn parse_winner(raw: &str, home: &TeamId, away: &TeamId, line: usize) -> Result<Option<TeamId>> {
    match raw {
        "" => Ok(None),
        "0" => Ok(Some(home.clone())),
        "1" => Ok(Some(away.clone())),
        name => {
            let winner = teams::canonical(name);
            if winner == *home || winner == *away {
                Ok(Some(winner))
            } else {
                Err(malformed(
                    line,
                    format!("winner '{}' did not play in this game", name),
                ))
            }
        }
    }
}

/// Convert one `{date, home_team, away_team, [winning_team]}` row
pub fn parse_schedule_row(row: &RawRow, line: usize) -> Result<Matchup> {
    let date = parse_date(required(row, line, "date")?).map_err(|e| malformed(line, e))?;
    let home = teams::canonical(required(row, line, "home_team")?);
    let away = teams::canonical(required(row, line, "away_team")?);
    if home == away {
        return Err(malformed(line, format!("{} cannot play itself", home)));
    }

    let winner_raw = row.get("winning_team").map(String::as_str).unwrap_or("");
    let winning_team = parse_winner(winner_raw, &home, &away, line)?;
    Ok(Matchup {
        date,
        home_team: home,
        away_team: away,
        winning_team,
    })
}

pub fn parse_schedule<R: Read>(reader: R) -> Result<IngestBatch<Matchup>> {
    let mut batch = IngestBatch::new();
    for row in read_rows(reader)? {
        match row.and_then(|(line, row)| parse_schedule_row(&row, line)) {
            Ok(m) => batch.records.push(m),
            Err(e) => batch.reject(e),
        }
    }
    Ok(batch)
}

/// Parse a basketball-reference schedule export
///
/// Columns are positional because the header repeats `PTS`:
/// date, start time, visitor, visitor points, home, home points, ...
/// Games without points are returned as scheduled (no winner).
pub fn parse_bref_schedule<R: Read>(reader: R) -> Result<IngestBatch<Matchup>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut batch = IngestBatch::new();

    for (idx, rec) in rdr.records().enumerate() {
        let rec = match rec {
            Ok(rec) => rec,
            Err(e) => {
                batch.reject(malformed(error_line(&e), e.to_string()));
                continue;
            }
        };
        let line = record_line(&rec, idx + 2);
        match parse_bref_row(&rec, line) {
            Ok(m) => batch.records.push(m),
            Err(e) => batch.reject(e),
        }
    }
    Ok(batch)
}

fn parse_bref_row(rec: &StringRecord, line: usize) -> Result<Matchup> {
    let field = |i: usize| rec.get(i).map(str::trim).unwrap_or("");
    if rec.len() < 6 {
        return Err(malformed(line, format!("expected 6+ columns, found {}", rec.len())));
    }

    let date = parse_date(field(0)).map_err(|e| malformed(line, e))?;
    let away = teams::canonical(field(2));
    let home = teams::canonical(field(4));

    let (away_pts, home_pts) = (field(3), field(5));
    if away_pts.is_empty() || home_pts.is_empty() {
        return Ok(Matchup::scheduled(date, home, away));
    }
    let parse_pts = |raw: &str| {
        raw.parse::<u32>()
            .map_err(|_| malformed(line, format!("invalid points '{}'", raw)))
    };
    let (away_pts, home_pts) = (parse_pts(away_pts)?, parse_pts(home_pts)?);

    let winner = if home_pts > away_pts { home.clone() } else { away.clone() };
    Ok(Matchup::completed(date, home, away, winner))
}
