//! Final-furlong rank × popularity group ROI.
//!
//! Ranks are derived per race, so the population is collected race by race
//! from a capped sample of race ids. Every entry counts toward the `All`
//! group and toward its own popularity band.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::{BuilderConfig, GroupAggregate, GroupSpec, RoiBuilder, RoiEntry};
use crate::codes::PopularityGroup;
use crate::pipeline::{clean_results, rank_last_3f};
use crate::source::{RaceFilter, RaceSource};

/// Adjustment returned when there is nothing to compare against
const NEUTRAL_ADJUSTMENT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Last3fKey {
    pub group: PopularityGroup,
    pub last_3f_rank: u32,
}

impl fmt::Display for Last3fKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.group, self.last_3f_rank)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Last3fFilter {
    pub group: Option<PopularityGroup>,
    pub last_3f_rank: Option<u32>,
}

pub struct Last3f;

impl GroupSpec for Last3f {
    type Key = Last3fKey;
    type Filter = Last3fFilter;

    const NAME: &'static str = "last-3f";

    fn keys(entry: &RoiEntry) -> Vec<Last3fKey> {
        let Some(last_3f_rank) = entry.last_3f_rank else {
            return Vec::new();
        };

        let mut keys = vec![Last3fKey {
            group: PopularityGroup::All,
            last_3f_rank,
        }];
        if let Some(band) = PopularityGroup::band(entry.popularity) {
            keys.push(Last3fKey {
                group: band,
                last_3f_rank,
            });
        }
        keys
    }

    fn matches(key: &Last3fKey, filter: &Last3fFilter) -> bool {
        filter.group.map_or(true, |g| g == key.group)
            && filter.last_3f_rank.map_or(true, |r| r == key.last_3f_rank)
    }

    fn collect(source: &dyn RaceSource, config: &BuilderConfig) -> Result<Vec<RoiEntry>> {
        let race_ids = source.race_ids(config.start_year, config.end_year, config.sample_races)?;
        info!("Sampling {} races for last-3F ROI", race_ids.len());

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for race_id in &race_ids {
            let raw = source.race_results(&RaceFilter::race(race_id))?;
            if raw.is_empty() {
                debug!("Race {} has no results, skipped", race_id);
                skipped += 1;
                continue;
            }

            entries.extend(
                rank_last_3f(clean_results(&raw))
                    .iter()
                    .filter_map(|row| RoiEntry::from_result(&row.result, row.last_3f_rank)),
            );
        }

        if skipped > 0 {
            warn!("{} of {} sampled races had no results", skipped, race_ids.len());
        }
        Ok(entries)
    }
}

pub type Last3fBuilder<'a> = RoiBuilder<'a, Last3f>;

impl RoiBuilder<'_, Last3f> {
    /// Rows of one popularity group, ordered by final-furlong rank
    pub fn last_3f_roi_stats(
        &mut self,
        group: PopularityGroup,
    ) -> Result<Vec<GroupAggregate<Last3fKey>>> {
        let rows = self.build(false)?;
        let mut stats: Vec<GroupAggregate<Last3fKey>> = rows
            .iter()
            .filter(|row| row.key.group == group)
            .cloned()
            .collect();
        stats.sort_by_key(|row| row.key.last_3f_rank);
        Ok(stats)
    }

    /// ROI multiplier for a final-furlong rank: ROI of the nearest ranked
    /// row over the group's mean ROI. 1.0 when the group has no data.
    pub fn last_3f_roi_adjustment(
        &mut self,
        last_3f_rank: f64,
        group: PopularityGroup,
    ) -> Result<f64> {
        let stats = self.last_3f_roi_stats(group)?;
        Ok(roi_adjustment(&stats, last_3f_rank))
    }
}

/// `stats` must be ordered by rank; ties in distance go to the better rank
fn roi_adjustment(stats: &[GroupAggregate<Last3fKey>], last_3f_rank: f64) -> f64 {
    if !last_3f_rank.is_finite() {
        return NEUTRAL_ADJUSTMENT;
    }

    let distance =
        |row: &GroupAggregate<Last3fKey>| (f64::from(row.key.last_3f_rank) - last_3f_rank).abs();
    let Some(closest) = stats.iter().min_by(|a, b| distance(a).total_cmp(&distance(b))) else {
        return NEUTRAL_ADJUSTMENT;
    };

    let mean = stats.iter().map(|row| row.roi).sum::<f64>() / stats.len() as f64;
    if mean <= 0.0 {
        return NEUTRAL_ADJUSTMENT;
    }
    closest.roi / mean
}
