//! Keiba-Stats
//!
//! Historical performance statistics for horse racing: cleaning of raw
//! coded race results, final-furlong ranking, rolling per-horse history
//! features and grouped ROI lookup tables (sire, jockey, horse, rank).

pub mod builders;
pub mod codes;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod types;

pub use builders::{BuilderConfig, GroupAggregate, GroupSpec, RoiBuilder};
pub use pipeline::{FeatureRow, HistoryFeatures, RankedRow};
pub use source::{RaceFilter, RaceSource};
pub use storage::RaceRepository;
pub use types::{HorseProfile, RaceId, RaceRecord, RawResultRow, ResultRow};
