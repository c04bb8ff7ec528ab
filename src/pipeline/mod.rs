//! Feature pipeline: clean → derived rank → rolling history.
//!
//! Each stage returns new rows and leaves its input untouched.

pub mod clean;
pub mod history;
pub mod rank;

pub use clean::{clean_results, clean_row};
pub use history::{add_history_features, FeatureRow, HistoryFeatures, DEFAULT_WINDOW};
pub use rank::{rank_last_3f, RankedRow};

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::source::{RaceFilter, RaceSource};
use crate::types::{RaceId, RawResultRow};

/// Run all three stages over a raw result set
pub fn process(raw: &[RawResultRow], window: usize) -> Vec<FeatureRow> {
    add_history_features(rank_last_3f(clean_results(raw)), window)
}

/// Feature rows for every runner of one race.
///
/// Fetches the runners' most recent prior races in full, so that derived
/// ranks in those races are computed against the whole field.
pub fn prepare_race(
    source: &dyn RaceSource,
    race_id: &RaceId,
    window: usize,
) -> Result<Vec<FeatureRow>> {
    let runners = source.race_results(&RaceFilter::race(race_id))?;
    if runners.is_empty() {
        warn!("No runners found for race {}", race_id);
        return Ok(Vec::new());
    }

    let Some(race_date) = race_id.date() else {
        warn!("Race {} has no valid date; history unavailable", race_id);
        return Ok(process(&runners, window));
    };

    let mut prior_races: BTreeSet<RaceId> = BTreeSet::new();
    for runner in &runners {
        prior_races.extend(source.last_n_runs(&runner.horse_id, window, Some(race_date))?);
    }
    debug!(
        "Race {}: {} runners, {} prior races",
        race_id,
        runners.len(),
        prior_races.len()
    );

    let mut raw = runners;
    for id in &prior_races {
        raw.extend(source.race_results(&RaceFilter::race(id))?);
    }

    let features: Vec<FeatureRow> = process(&raw, window)
        .into_iter()
        .filter(|row| &row.result.race_id == race_id)
        .collect();
    info!("Prepared {} feature rows for race {}", features.len(), race_id);

    Ok(features)
}

/// The horse's most recent `n_races` races with features, oldest first
pub fn horse_history(
    source: &dyn RaceSource,
    horse_id: &str,
    n_races: usize,
    window: usize,
) -> Result<Vec<FeatureRow>> {
    // The recent races plus enough earlier ones to fill their windows
    let races = source.last_n_runs(horse_id, n_races.saturating_add(window), None)?;
    if races.is_empty() {
        warn!("No results found for horse {}", horse_id);
        return Ok(Vec::new());
    }

    let mut raw = Vec::new();
    for id in &races {
        raw.extend(source.race_results(&RaceFilter::race(id))?);
    }

    let mut rows: Vec<FeatureRow> = process(&raw, window)
        .into_iter()
        .filter(|row| row.result.horse_id == horse_id)
        .collect();
    rows.sort_by(|a, b| {
        a.result
            .race_date
            .cmp(&b.result.race_date)
            .then_with(|| a.result.race_id.cmp(&b.result.race_id))
    });
    let skip = rows.len().saturating_sub(n_races);

    Ok(rows.split_off(skip))
}
