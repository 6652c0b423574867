//! Feature engineering
//!
//! Converts stored game logs into leakage-free pre-game team snapshots.

pub mod engine;
pub mod policy;
pub mod schema;
pub mod store;

pub use engine::{FeatureEngine, Snapshot};
pub use policy::{AggregationPolicy, DerivedMode};
pub use schema::{DerivedStat, FeatureSchema, StatKind, StatSpec};
pub use store::FeatureStore;
