//! NBA game prediction CLI
//!
//! Ingests team game logs, builds leakage-free form features and scores
//! scheduled games with an exported model.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hoopcast::{Config, Result};

#[derive(Parser)]
#[command(name = "hoopcast")]
#[command(about = "NBA winner prediction from rolling team form", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Feature store commands
    Features {
        #[command(subcommand)]
        action: FeatureCommands,
    },
    /// Training table commands
    Dataset {
        #[command(subcommand)]
        action: DatasetCommands,
    },
    /// Predict every game scheduled on a date
    Predict {
        /// Game date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Score the exported model against completed games
    Evaluate,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Ingest a game-log CSV (date, team, stat columns)
    Ingest {
        /// CSV file path
        file: String,
    },
    /// Ingest a schedule CSV (date, home_team, away_team, [winning_team])
    Schedule {
        /// CSV file path
        file: String,
        /// File is a basketball-reference schedule export
        #[arg(long)]
        bref: bool,
    },
    /// Load every team's game log for a season from the source directory
    Sync {
        /// Season (year it ends in, e.g. 2025)
        #[arg(long)]
        season: u16,
        /// Only sync one team
        #[arg(long)]
        team: Option<String>,
    },
    /// Show database status
    Status,
    /// Delete all stored games and schedules
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FeatureCommands {
    /// Export every team snapshot as CSV
    Export {
        /// Output path
        #[arg(long, default_value = "data/averages.csv")]
        output: String,
    },
    /// Show a team's form before a date
    Lookup {
        /// Team name, code or alias
        team: String,
        /// As-of date (YYYY-MM-DD)
        date: NaiveDate,
    },
    /// Show one stat's recent form for a team
    History {
        /// Team name, code or alias
        team: String,
        /// Stat name from the schema
        stat: String,
        /// Only snapshots dated before this date (defaults to after the last game)
        #[arg(long)]
        before: Option<NaiveDate>,
        /// Number of snapshots to show
        #[arg(long, default_value = "25")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum DatasetCommands {
    /// Build the matchup feature table
    Build {
        /// Output path (defaults to data.feature_table_path)
        #[arg(long)]
        output: Option<String>,
        /// Only include games dated before this date
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Correlate matchup features with the game result
    Correlate {
        /// Correlate this column against every other column instead
        #[arg(long)]
        feature: Option<String>,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Data { action } => match action {
            DataCommands::Ingest { file } => commands::data_ingest(&config, &file),
            DataCommands::Schedule { file, bref } => commands::data_schedule(&config, &file, bref),
            DataCommands::Sync { season, team } => commands::data_sync(&config, season, team),
            DataCommands::Status => commands::data_status(&config),
            DataCommands::Reset { yes } => commands::data_reset(&config, yes),
        },
        Commands::Features { action } => match action {
            FeatureCommands::Export { output } => commands::features_export(&config, &output),
            FeatureCommands::Lookup { team, date } => commands::features_lookup(&config, &team, date),
            FeatureCommands::History {
                team,
                stat,
                before,
                limit,
            } => commands::features_history(&config, &team, &stat, before, limit),
        },
        Commands::Dataset { action } => match action {
            DatasetCommands::Build { output, as_of } => commands::dataset_build(&config, output, as_of),
            DatasetCommands::Correlate { feature } => commands::dataset_correlate(&config, feature),
        },
        Commands::Predict { date, format } => commands::predict(&config, date, format),
        Commands::Evaluate => commands::evaluate(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoopcast::data::ingest::{self, IngestBatch};
    use hoopcast::data::{teams, with_retry, CsvDirectorySource, Database, StatsSource, UpsertReport};
    use hoopcast::features::{FeatureEngine, FeatureSchema, FeatureStore};
    use hoopcast::predict::{
        feature_correlations, format_prediction, label_correlations, LogisticScorer, MatchupAssembler,
        Metrics, Predictor,
    };
    use hoopcast::{GameRecord, HoopError, TeamId};
    use std::path::Path;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to choose the stat columns and window", config_path);
        println!("  2. Run 'hoopcast data ingest <gamelog.csv>' and 'hoopcast data schedule <schedule.csv>'");
        println!("  3. Run 'hoopcast dataset build' and train a scorer on the table");
        println!("  4. Run 'hoopcast predict --date YYYY-MM-DD'");

        Ok(())
    }

    fn build_store(config: &Config, db: &Database) -> Result<FeatureStore> {
        let engine = FeatureEngine::from_config(config)?;
        FeatureStore::build(db, engine)
    }

    fn print_report(batch_rejected: usize, report: &UpsertReport) {
        println!(
            "Stored {} new, {} replaced, {} unchanged ({} rows rejected)",
            report.inserted, report.replaced, report.unchanged, batch_rejected
        );
        for dup in &report.duplicates {
            println!("  duplicate key: {} {}", dup.date, dup.team);
        }
    }

    fn print_rejected<T>(batch: &IngestBatch<T>) {
        for err in batch.rejected.iter().take(10) {
            println!("  {}", err);
        }
        if batch.rejected.len() > 10 {
            println!("  ... and {} more", batch.rejected.len() - 10);
        }
    }

    pub fn data_ingest(config: &Config, file: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let batch = ingest::load_game_log(Path::new(file), &config.schema.stats)?;
        print_rejected(&batch);

        let report = db.upsert(&batch.records)?;
        print_report(batch.rejected.len(), &report);
        Ok(())
    }

    pub fn data_schedule(config: &Config, file: &str, bref: bool) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let reader = std::fs::File::open(file)?;
        let batch = if bref {
            ingest::parse_bref_schedule(reader)?
        } else {
            ingest::parse_schedule(reader)?
        };
        print_rejected(&batch);

        let count = db.upsert_matchups(&batch.records)?;
        let completed = batch.records.iter().filter(|m| m.label().is_some()).count();
        println!(
            "Stored {} games ({} completed, {} rejected)",
            count,
            completed,
            batch.rejected.len()
        );
        Ok(())
    }

    pub fn data_sync(config: &Config, season: u16, team: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let source = CsvDirectorySource::new(&config.data.source_dir, config.schema.stats.clone());

        let team_ids: Vec<TeamId> = match team {
            Some(name) => vec![teams::normalize(&name)?],
            None => teams::FRANCHISES.iter().map(teams::Franchise::id).collect(),
        };

        println!("Syncing {} season from {}...", season, source.name());
        let mut records: Vec<GameRecord> = Vec::new();
        let mut rejected = 0;
        for team in &team_ids {
            match with_retry(|| source.fetch_team_game_log(team, season), 3) {
                Ok(batch) => {
                    rejected += batch.rejected.len();
                    records.extend(batch.records);
                }
                Err(e) => log::warn!("Skipping {}: {}", team, e),
            }
        }

        let report = db.upsert(&records)?;
        print_report(rejected, &report);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:      {}", config.data.database_path);
        println!("  Teams:     {}", stats.team_count);
        println!("  Records:   {}", stats.record_count);
        println!("  Schedule:  {}", stats.matchup_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:     {} to {}", earliest, latest);
        }

        let teams = db.teams()?;
        if !teams.is_empty() {
            let names: Vec<String> = teams.iter().map(|t| t.to_string()).collect();
            println!("\nTeams with history:");
            for chunk in names.chunks(3) {
                println!("  {}", chunk.join(", "));
            }
        }

        Ok(())
    }

    pub fn data_reset(config: &Config, yes: bool) -> Result<()> {
        if !yes {
            println!("This deletes every stored game. Re-run with --yes to confirm.");
            return Ok(());
        }
        let db = Database::open(&config.data.database_path)?;
        db.reset()?;
        println!("Cleared {}", config.data.database_path);
        Ok(())
    }

    pub fn features_export(config: &Config, output: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = build_store(config, &db)?;
        let count = store.export_snapshots(Path::new(output))?;
        println!("Exported {} snapshots to {}", count, output);
        Ok(())
    }

    pub fn features_lookup(config: &Config, team: &str, date: NaiveDate) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = build_store(config, &db)?;
        let team = teams::canonical(team);

        match store.query(&team, date) {
            Ok((names, values)) => {
                println!("{} before {} ({})", team, date, store.schema());
                for (name, value) in names.iter().zip(&values) {
                    println!("  {:<12} {:>8.2}", name, value);
                }
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                println!("Not found: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn features_history(
        config: &Config,
        team: &str,
        stat: &str,
        before: Option<NaiveDate>,
        limit: usize,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = build_store(config, &db)?;
        let team = teams::canonical(team);
        let before = before.unwrap_or(NaiveDate::MAX);

        let history = store.stat_history(&team, stat, before, limit)?;
        if history.is_empty() {
            println!("No {} history for {}", stat, team);
            return Ok(());
        }

        println!("{} {} (last {} snapshots)", team, stat, history.len());
        for (as_of, value) in &history {
            println!("  {}  {:>8.2}", as_of, value);
        }
        Ok(())
    }

    pub fn dataset_build(config: &Config, output: Option<String>, as_of: Option<NaiveDate>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = build_store(config, &db)?;

        let mut matchups = db.all_matchups()?;
        if let Some(cutoff) = as_of {
            matchups.retain(|m| m.date < cutoff);
        }

        let table = MatchupAssembler::new(&store).build_table(&matchups);
        let output = output.unwrap_or_else(|| config.data.feature_table_path.clone());
        let written = table.write_csv(Path::new(&output), true)?;

        println!("Wrote {} rows to {}", written, output);
        println!("  Labelled:  {}", table.labelled().count());
        println!("  Skipped:   {} (missing history)", table.skipped.len());
        println!("  Schema:    {}", table.schema);
        Ok(())
    }

    pub fn dataset_correlate(config: &Config, feature: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = build_store(config, &db)?;
        let table = MatchupAssembler::new(&store).build_table(&db.all_matchups()?);

        let correlations = match &feature {
            Some(feature) => feature_correlations(&table, feature)?,
            None => label_correlations(&table),
        };

        let target = feature.as_deref().unwrap_or("winning_team");
        println!(
            "Correlation with {} over {} completed games",
            target,
            table.labelled().count()
        );
        for correlation in &correlations {
            println!("  {}", correlation);
        }
        Ok(())
    }

    fn load_predictor(config: &Config, db: &Database) -> Result<Predictor<LogisticScorer>> {
        let scorer = LogisticScorer::load(Path::new(&config.data.model_path))?;
        let manifest = FeatureSchema::manifest_path(Path::new(&config.data.feature_table_path));
        let trained = FeatureSchema::load(&manifest).map_err(|e| {
            HoopError::Config(format!(
                "Cannot read training schema {}: {}. Run 'hoopcast dataset build' first.",
                manifest.display(),
                e
            ))
        })?;
        let store = build_store(config, db)?;
        Predictor::new(store, scorer, &trained)
    }

    pub fn predict(config: &Config, date: NaiveDate, format: OutputFormat) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictor = load_predictor(config, &db)?;
        let day = predictor.predict_day(&db, date)?;

        match format {
            OutputFormat::Table => {
                if day.predictions.is_empty() {
                    println!("No predictable games on {}", date);
                }
                for prediction in &day.predictions {
                    print!("{}", format_prediction(prediction));
                }
                for (matchup, missing) in &day.skipped {
                    let missing: Vec<String> = missing.iter().map(|t| t.to_string()).collect();
                    println!("Skipped {} (no history: {})", matchup, missing.join(", "));
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&day.predictions)?);
            }
            OutputFormat::Csv => {
                println!("date,home,away,label,home_win_prob,away_win_prob");
                for p in &day.predictions {
                    println!(
                        "{},{},{},{},{:.3},{:.3}",
                        p.date, p.home_team, p.away_team, p.label, p.home_win_prob, p.away_win_prob
                    );
                }
            }
        }
        Ok(())
    }

    pub fn evaluate(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictor = load_predictor(config, &db)?;

        let matchups = db.all_matchups()?;
        let table = MatchupAssembler::new(predictor.store()).build_table(&matchups);
        let metrics = Metrics::evaluate(predictor.scorer(), &table)?;

        println!("Evaluation over {} completed games", metrics.total);
        println!("  {}", metrics);
        Ok(())
    }
}
