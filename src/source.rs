//! Query layer boundary.
//!
//! The feature pipeline and the ROI builders only see race data through
//! [`RaceSource`]; [`crate::storage::RaceRepository`] is the SQLite
//! implementation.

use anyhow::Result;
use chrono::NaiveDate;

use crate::types::{HorseProfile, RaceId, RaceRecord, RawResultRow};

/// Filter for race and result queries. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceFilter {
    pub year: Option<u16>,
    /// Inclusive year range
    pub year_range: Option<(u16, u16)>,
    /// Inclusive month-day bounds (`MMDD`)
    pub start_month_day: Option<String>,
    pub end_month_day: Option<String>,
    pub race_id: Option<RaceId>,
    pub horse_id: Option<String>,
    /// Only races strictly before this date
    pub before: Option<NaiveDate>,
}

impl RaceFilter {
    pub fn race(race_id: &RaceId) -> Self {
        Self {
            race_id: Some(race_id.clone()),
            ..Default::default()
        }
    }

    pub fn horse(horse_id: &str) -> Self {
        Self {
            horse_id: Some(horse_id.to_string()),
            ..Default::default()
        }
    }

    pub fn year(year: u16) -> Self {
        Self {
            year: Some(year),
            ..Default::default()
        }
    }

    pub fn years(start_year: u16, end_year: u16) -> Self {
        Self {
            year_range: Some((start_year, end_year)),
            ..Default::default()
        }
    }

    /// Restrict to an inclusive `MMDD` range within each year
    pub fn month_days(mut self, start: &str, end: &str) -> Self {
        self.start_month_day = Some(start.to_string());
        self.end_month_day = Some(end.to_string());
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }
}

/// Source of historical race data
pub trait RaceSource {
    /// Race-level records matching the filter
    fn race_info(&self, filter: &RaceFilter) -> Result<Vec<RaceRecord>>;

    /// Result rows (joined with their race) matching the filter
    fn race_results(&self, filter: &RaceFilter) -> Result<Vec<RawResultRow>>;

    /// Horse profiles, optionally for a single horse and/or limited in count
    fn horse_profiles(&self, horse_id: Option<&str>, limit: Option<usize>)
        -> Result<Vec<HorseProfile>>;

    /// Ids of the horse's latest `n` races, newest first, optionally only
    /// those strictly before `before`
    fn last_n_runs(&self, horse_id: &str, n: usize, before: Option<NaiveDate>)
        -> Result<Vec<RaceId>>;

    /// Race ids in a year range, in race-id order
    fn race_ids(&self, start_year: u16, end_year: u16, limit: usize) -> Result<Vec<RaceId>>;
}
