//! Grouped ROI builders.
//!
//! One aggregation shape specialised four times: a [`GroupSpec`] names the
//! grouping key, the filter dimensions and how the population is collected;
//! [`RoiBuilder`] owns the cache and the `build` / `get_top` / `get_score`
//! accessors.
//!
//! ROI models a unit stake on every entry: the sum of winning odds divided by
//! the entry count, times 100. Losing entries contribute nothing.

pub mod horse_course;
pub mod jockey_course;
pub mod last_3f;
pub mod sire_track;

pub use crate::config::BuilderConfig;
pub use horse_course::{HorseCourse, HorseCourseFilter, HorseCourseKey};
pub use jockey_course::{JockeyCourse, JockeyCourseFilter, JockeyCourseKey};
pub use last_3f::{Last3f, Last3fFilter, Last3fKey};
pub use sire_track::{SireTrack, SireTrackFilter, SireTrackKey};

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info};

use crate::codes::{DistanceCategory, Surface, TrackCondition};
use crate::pipeline::clean_results;
use crate::source::{RaceFilter, RaceSource};
use crate::types::{RaceId, ResultRow};

/// Rows returned by `get_top` when the caller has no preference
pub const DEFAULT_TOP_N: usize = 10;

/// Score for keys without an aggregate (the mean)
pub const NEUTRAL_SCORE: f64 = 100.0;

/// Wins at a popularity above this count as non-favourite wins
const FAVORITE_MAX_POPULARITY: u32 = 3;

/// One runner in the ROI population: a valid finishing rank, a popularity
/// and win odds are all present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiEntry {
    pub race_id: RaceId,
    pub horse_id: String,
    pub horse_name: String,
    pub jockey_code: Option<String>,
    pub jockey_name: Option<String>,
    pub sire_name: Option<String>,
    pub course_name: String,
    pub surface: Surface,
    pub track_condition: TrackCondition,
    pub distance_category: Option<DistanceCategory>,
    pub rank: u32,
    pub popularity: u32,
    pub odds: f64,
    pub last_3f_rank: Option<u32>,
}

impl RoiEntry {
    /// `None` when the row is outside the population
    pub fn from_result(row: &ResultRow, last_3f_rank: Option<u32>) -> Option<Self> {
        Some(Self {
            rank: row.rank?,
            popularity: row.popularity?,
            odds: row.odds?,
            race_id: row.race_id.clone(),
            horse_id: row.horse_id.clone(),
            horse_name: row.horse_name.clone(),
            jockey_code: row.jockey_code.clone(),
            jockey_name: row.jockey_name.clone(),
            sire_name: None,
            course_name: row.course_name.clone(),
            surface: row.surface,
            track_condition: row.track_condition,
            distance_category: row.distance_category,
            last_3f_rank,
        })
    }

    pub fn is_win(&self) -> bool {
        self.rank == 1
    }
}

/// Grouping behaviour of one builder
pub trait GroupSpec {
    type Key: Clone + Ord + fmt::Debug + fmt::Display + Serialize;
    /// Optional dimension values for `get_top`; `Default` matches everything
    type Filter: Default + fmt::Debug;

    const NAME: &'static str;

    /// Whether entries need the sire name from the pedigree table
    const NEEDS_PEDIGREE: bool = false;

    /// Keys the entry counts toward. An empty vector excludes the entry.
    fn keys(entry: &RoiEntry) -> Vec<Self::Key>;

    /// Display name for the group the entry opens
    fn label(_entry: &RoiEntry) -> String {
        String::new()
    }

    fn matches(key: &Self::Key, filter: &Self::Filter) -> bool;

    /// Fetch the population for the configured year range
    fn collect(source: &dyn RaceSource, config: &BuilderConfig) -> Result<Vec<RoiEntry>> {
        collect_population(source, config, Self::NEEDS_PEDIGREE)
    }
}

/// Aggregate row for one grouping key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate<K> {
    #[serde(flatten)]
    pub key: K,
    pub label: String,
    pub total: usize,
    pub wins: usize,
    /// Percent
    pub win_rate: f64,
    /// Percent return on a unit stake per entry
    pub roi: f64,
    pub avg_popularity: f64,
    /// Mean odds over every entry
    pub avg_odds: f64,
    /// Mean odds over winning entries; `None` without wins
    pub avg_win_odds: Option<f64>,
    pub top3_count: usize,
    /// Percent
    pub top3_rate: f64,
    pub non_favorite_wins: usize,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    label: String,
    total: usize,
    wins: usize,
    top3: usize,
    popularity_sum: f64,
    odds_sum: f64,
    win_odds_sum: f64,
    non_favorite_wins: usize,
}

impl GroupAccumulator {
    fn new(label: String) -> Self {
        Self {
            label,
            ..Default::default()
        }
    }

    fn update(&mut self, entry: &RoiEntry) {
        self.total += 1;
        self.popularity_sum += f64::from(entry.popularity);
        self.odds_sum += entry.odds;
        if entry.rank <= 3 {
            self.top3 += 1;
        }
        if entry.is_win() {
            self.wins += 1;
            self.win_odds_sum += entry.odds;
            if entry.popularity > FAVORITE_MAX_POPULARITY {
                self.non_favorite_wins += 1;
            }
        }
    }

    fn finish<K>(self, key: K) -> GroupAggregate<K> {
        let total = self.total as f64;
        GroupAggregate {
            key,
            label: self.label,
            total: self.total,
            wins: self.wins,
            win_rate: self.wins as f64 / total * 100.0,
            roi: self.win_odds_sum / total * 100.0,
            avg_popularity: self.popularity_sum / total,
            avg_odds: self.odds_sum / total,
            avg_win_odds: (self.wins > 0).then(|| self.win_odds_sum / self.wins as f64),
            top3_count: self.top3,
            top3_rate: self.top3 as f64 / total * 100.0,
            non_favorite_wins: self.non_favorite_wins,
        }
    }
}

/// Group `entries` by `S`'s keys, drop groups under `min_samples` and sort
/// by ROI descending. Equal ROIs keep key order.
pub fn aggregate<S: GroupSpec>(
    entries: &[RoiEntry],
    min_samples: usize,
) -> Vec<GroupAggregate<S::Key>> {
    let mut groups: BTreeMap<S::Key, GroupAccumulator> = BTreeMap::new();
    for entry in entries {
        for key in S::keys(entry) {
            groups
                .entry(key)
                .or_insert_with(|| GroupAccumulator::new(S::label(entry)))
                .update(entry);
        }
    }

    let group_count = groups.len();
    let mut rows: Vec<GroupAggregate<S::Key>> = groups
        .into_iter()
        .filter(|(_, acc)| acc.total >= min_samples)
        .map(|(key, acc)| acc.finish(key))
        .collect();
    rows.sort_by(|a, b| b.roi.total_cmp(&a.roi));

    debug!(
        "{}: {} of {} groups meet the {} sample threshold",
        S::NAME,
        rows.len(),
        group_count,
        min_samples
    );
    rows
}

/// Default population: every result in the year range that has a valid
/// rank, popularity and odds, with sire names joined when requested.
pub fn collect_population(
    source: &dyn RaceSource,
    config: &BuilderConfig,
    with_sire: bool,
) -> Result<Vec<RoiEntry>> {
    let raw = source.race_results(&RaceFilter::years(config.start_year, config.end_year))?;
    let rows = clean_results(&raw);

    let sires: HashMap<String, String> = if with_sire {
        source
            .horse_profiles(None, None)?
            .into_iter()
            .filter_map(|h| h.known_sire().map(|sire| (h.horse_id.clone(), sire.to_string())))
            .collect()
    } else {
        HashMap::new()
    };

    let entries: Vec<RoiEntry> = rows
        .iter()
        .filter_map(|row| RoiEntry::from_result(row, None))
        .map(|mut entry| {
            entry.sire_name = sires.get(&entry.horse_id).cloned();
            entry
        })
        .collect();

    debug!(
        "{} of {} result rows enter the ROI population",
        entries.len(),
        rows.len()
    );
    Ok(entries)
}

/// ROI of `key` relative to the mean ROI of `rows` (mean = 100)
pub fn normalized_score<K: PartialEq>(rows: &[GroupAggregate<K>], key: &K) -> f64 {
    let Some(row) = rows.iter().find(|r| &r.key == key) else {
        return NEUTRAL_SCORE;
    };

    let mean = rows.iter().map(|r| r.roi).sum::<f64>() / rows.len() as f64;
    if mean <= 0.0 {
        return NEUTRAL_SCORE;
    }
    row.roi / mean * 100.0
}

/// Cached grouped ROI table for one [`GroupSpec`]
pub struct RoiBuilder<'a, S: GroupSpec> {
    source: &'a dyn RaceSource,
    config: BuilderConfig,
    cache: Option<Vec<GroupAggregate<S::Key>>>,
    _spec: PhantomData<S>,
}

impl<'a, S: GroupSpec> RoiBuilder<'a, S> {
    pub fn new(source: &'a dyn RaceSource, config: BuilderConfig) -> Self {
        Self {
            source,
            config,
            cache: None,
            _spec: PhantomData,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        self.cache.is_some()
    }

    /// Build the table, or return the cached one unless `force_rebuild`
    pub fn build(&mut self, force_rebuild: bool) -> Result<&[GroupAggregate<S::Key>]> {
        if force_rebuild || self.cache.is_none() {
            info!(
                "Building {} ROI table ({}-{}, min {} samples)",
                S::NAME,
                self.config.start_year,
                self.config.end_year,
                self.config.min_samples
            );

            let entries = S::collect(self.source, &self.config)?;
            let rows = aggregate::<S>(&entries, self.config.min_samples);
            info!("{}: {} groups from {} entries", S::NAME, rows.len(), entries.len());

            self.cache = Some(rows);
        }

        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Top `top_n` rows by ROI among those matching `filter`
    pub fn get_top(
        &mut self,
        filter: &S::Filter,
        top_n: usize,
    ) -> Result<Vec<GroupAggregate<S::Key>>> {
        let rows = self.build(false)?;
        Ok(rows
            .iter()
            .filter(|row| S::matches(&row.key, filter))
            .take(top_n)
            .cloned()
            .collect())
    }

    /// Normalised ROI score for one key; 100.0 when the key has no row
    pub fn get_score(&mut self, key: &S::Key) -> Result<f64> {
        let rows = self.build(false)?;
        Ok(normalized_score(rows, key))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::entry;
    use super::*;
    use crate::storage::repository::fixtures::{horse, race, result};
    use crate::storage::RaceRepository;

    /// Groups by horse id only
    struct ByHorse;

    impl GroupSpec for ByHorse {
        type Key = String;
        type Filter = Option<String>;

        const NAME: &'static str = "by-horse";

        fn keys(entry: &RoiEntry) -> Vec<String> {
            vec![entry.horse_id.clone()]
        }

        fn label(entry: &RoiEntry) -> String {
            entry.horse_name.clone()
        }

        fn matches(key: &String, filter: &Option<String>) -> bool {
            filter.as_ref().map_or(true, |f| f == key)
        }
    }

    fn seeded_repo() -> RaceRepository {
        let repo = RaceRepository::in_memory().unwrap();
        repo.insert_race(&race("202201050501", "1600", "11", "1")).unwrap();
        repo.insert_race(&race("202202050501", "1600", "11", "1")).unwrap();
        repo.insert_result(&result("202201050501", "A", "01", "1", "0030", "340")).unwrap();
        repo.insert_result(&result("202201050501", "B", "02", "2", "0050", "345")).unwrap();
        repo.insert_result(&result("202202050501", "A", "03", "1", "0020", "350")).unwrap();
        repo.insert_result(&result("202202050501", "B", "01", "2", "0060", "341")).unwrap();
        // Scratched: outside the population
        repo.insert_result(&result("202202050501", "C", "00", "3", "0000", "")).unwrap();
        repo.insert_horse(&horse("A", "Sire A")).unwrap();
        repo
    }

    #[test]
    fn test_zero_wins_roi_is_zero() {
        let entries = vec![entry("A", 2, 1, 3.0), entry("A", 5, 2, 8.0)];
        let rows = aggregate::<ByHorse>(&entries, 1);
        assert_eq!(rows[0].roi, 0.0);
        assert_eq!(rows[0].avg_odds, 5.5);
        assert_eq!(rows[0].avg_win_odds, None);
    }

    #[test]
    fn test_all_wins_roi_is_hundred_times_odds() {
        let entries = vec![entry("A", 1, 2, 2.5), entry("A", 1, 2, 2.5), entry("A", 1, 2, 2.5)];
        let rows = aggregate::<ByHorse>(&entries, 1);
        assert_eq!(rows[0].roi, 250.0);
        assert_eq!(rows[0].win_rate, 100.0);
        assert_eq!(rows[0].avg_win_odds, Some(2.5));
    }

    #[test]
    fn test_aggregate_counts() {
        let entries = vec![
            entry("A", 1, 5, 12.0),
            entry("A", 3, 1, 1.8),
            entry("A", 7, 2, 4.0),
            entry("A", 1, 2, 4.0),
        ];
        let row = &aggregate::<ByHorse>(&entries, 1)[0];

        assert_eq!(row.total, 4);
        assert_eq!(row.wins, 2);
        assert_eq!(row.win_rate, 50.0);
        assert_eq!(row.roi, 400.0);
        assert_eq!(row.avg_popularity, 2.5);
        // Losing odds count toward the overall mean only
        assert!((row.avg_odds - 5.45).abs() < 1e-9);
        assert_eq!(row.avg_win_odds, Some(8.0));
        assert_eq!(row.top3_count, 3);
        assert_eq!(row.top3_rate, 75.0);
        assert_eq!(row.non_favorite_wins, 1);
        assert_eq!(row.label, "Horse A");
    }

    #[test]
    fn test_below_threshold_is_absent() {
        // B wins every time but has only two entries
        let entries = vec![
            entry("A", 2, 1, 2.0),
            entry("A", 1, 1, 2.0),
            entry("A", 4, 1, 2.0),
            entry("B", 1, 9, 50.0),
            entry("B", 1, 9, 50.0),
        ];
        let rows = aggregate::<ByHorse>(&entries, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "A");
    }

    #[test]
    fn test_sorted_by_roi_descending() {
        let entries = vec![
            entry("A", 1, 1, 2.0),
            entry("B", 1, 1, 9.0),
            entry("C", 2, 1, 9.0),
        ];
        let keys: Vec<String> = aggregate::<ByHorse>(&entries, 1)
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_normalized_score() {
        let entries = vec![entry("A", 1, 1, 3.0), entry("B", 1, 1, 1.0)];
        let rows = aggregate::<ByHorse>(&entries, 1);

        // Mean ROI is 200
        assert_eq!(normalized_score(&rows, &"A".to_string()), 150.0);
        assert_eq!(normalized_score(&rows, &"B".to_string()), 50.0);
        assert_eq!(normalized_score(&rows, &"Z".to_string()), NEUTRAL_SCORE);
    }

    #[test]
    fn test_score_neutral_when_mean_not_positive() {
        let rows = aggregate::<ByHorse>(&[entry("A", 4, 1, 3.0)], 1);
        assert_eq!(normalized_score(&rows, &"A".to_string()), NEUTRAL_SCORE);
        assert_eq!(normalized_score::<String>(&[], &"A".to_string()), NEUTRAL_SCORE);
    }

    #[test]
    fn test_collect_population_filters_and_joins_sires() {
        let repo = seeded_repo();
        let config = BuilderConfig::new(2022, 2022, 1);

        let entries = collect_population(&repo, &config, true).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.horse_id != "C"));

        let a = entries.iter().find(|e| e.horse_id == "A").unwrap();
        assert_eq!(a.sire_name.as_deref(), Some("Sire A"));
        assert_eq!(a.odds, 3.0);
        let b = entries.iter().find(|e| e.horse_id == "B").unwrap();
        assert_eq!(b.sire_name, None);
    }

    #[test]
    fn test_builder_caches_until_forced() {
        let repo = seeded_repo();
        let mut builder: RoiBuilder<ByHorse> = RoiBuilder::new(&repo, BuilderConfig::new(2022, 2022, 1));
        assert!(!builder.is_built());

        assert_eq!(builder.build(false).unwrap().len(), 2);
        assert!(builder.is_built());

        repo.insert_race(&race("202203050501", "1600", "11", "1")).unwrap();
        repo.insert_result(&result("202203050501", "D", "01", "1", "0015", "339")).unwrap();

        assert_eq!(builder.build(false).unwrap().len(), 2);
        assert_eq!(builder.build(true).unwrap().len(), 3);
    }

    #[test]
    fn test_get_top_builds_lazily_and_filters() {
        let repo = seeded_repo();
        let mut builder: RoiBuilder<ByHorse> = RoiBuilder::new(&repo, BuilderConfig::new(2022, 2022, 1));

        let top = builder.get_top(&None, DEFAULT_TOP_N).unwrap();
        assert!(builder.is_built());
        // B: 6.0 / 2 = 300; A: 3.0 / 2 = 150
        assert_eq!(top[0].key, "B");
        assert_eq!(top[0].roi, 300.0);
        assert_eq!(top[1].roi, 150.0);

        let only_a = builder.get_top(&Some("A".to_string()), DEFAULT_TOP_N).unwrap();
        assert_eq!(only_a.len(), 1);

        assert_eq!(builder.get_top(&None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_get_score_unseen_key() {
        let repo = seeded_repo();
        let mut builder: RoiBuilder<ByHorse> = RoiBuilder::new(&repo, BuilderConfig::new(2022, 2022, 1));
        assert_eq!(builder.get_score(&"nobody".to_string()).unwrap(), 100.0);
    }
}
