//! Data ingestion and storage
//!
//! CSV sources, the NBA team directory and SQLite record storage.

pub mod database;
pub mod ingest;
pub mod source;
pub mod teams;

pub use database::{Database, UpsertReport};
pub use source::{with_retry, CsvDirectorySource, StatsSource};
