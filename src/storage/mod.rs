//! SQLite storage module for historical race data
//!
//! Provides the query layer: raw race, result and pedigree rows from a
//! fixed JV-Data shaped schema.

pub mod repository;
pub mod schema;

pub use repository::{RaceRepository, StoredResult};
pub use schema::create_tables;
