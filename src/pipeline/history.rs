//! Rolling history stage.
//!
//! For every row, statistics over the same horse's previous N races that
//! took place strictly before the row's race date. Races on the same date
//! are treated as simultaneous and never see each other. Among prior races
//! sharing a date, race id decides the order, so "last race" is the highest
//! race id on the latest prior date.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::rank::RankedRow;
use crate::types::ResultRow;

/// Default number of prior races in the window
pub const DEFAULT_WINDOW: usize = 5;

/// Statistics over a horse's recent prior races. All `None` when the horse
/// has no prior race.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryFeatures {
    /// Number of prior races in the window
    pub prior_races: usize,
    pub avg_rank: Option<f64>,
    pub win_rate: Option<f64>,
    pub top2_rate: Option<f64>,
    pub top3_rate: Option<f64>,
    pub avg_rank_same_surface: Option<f64>,
    pub avg_rank_same_distance: Option<f64>,
    pub days_since_last_race: Option<i64>,
    pub last_race_rank: Option<u32>,
    pub last_race_popularity: Option<u32>,
    /// Carried weight now minus carried weight in the last race
    pub weight_carried_diff: Option<f64>,
    pub best_last_3f: Option<f64>,
    pub count_last_3f_rank1: Option<u32>,
}

/// A result row augmented with its derived rank and rolling history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub result: ResultRow,
    pub last_3f_rank: Option<u32>,
    #[serde(flatten)]
    pub history: HistoryFeatures,
}

impl FeatureRow {
    fn new(ranked: RankedRow, history: HistoryFeatures) -> Self {
        Self {
            result: ranked.result,
            last_3f_rank: ranked.last_3f_rank,
            history,
        }
    }
}

/// Add rolling history features over the previous `window` races.
/// Output order matches input order.
pub fn add_history_features(rows: Vec<RankedRow>, window: usize) -> Vec<FeatureRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    if rows.iter().all(|r| r.result.race_date.is_none()) {
        warn!("No row has a race date; rolling history skipped");
        return rows
            .into_iter()
            .map(|r| FeatureRow::new(r, HistoryFeatures::default()))
            .collect();
    }

    // Rows without a date can neither be placed in time nor join a window
    let mut by_horse: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        if row.result.race_date.is_some() {
            by_horse.entry(row.result.horse_id.as_str()).or_default().push(i);
        }
    }
    debug!("Rolling history over {} horses", by_horse.len());

    let mut features = vec![HistoryFeatures::default(); rows.len()];
    for indices in by_horse.values_mut() {
        indices.sort_by(|&a, &b| {
            let (ra, rb) = (&rows[a].result, &rows[b].result);
            ra.race_date
                .cmp(&rb.race_date)
                .then_with(|| ra.race_id.cmp(&rb.race_id))
                .then(a.cmp(&b))
        });

        let mut start = 0;
        while start < indices.len() {
            let date = rows[indices[start]].result.race_date;
            let same_date = indices[start..]
                .iter()
                .take_while(|&&i| rows[i].result.race_date == date)
                .count();

            let prior: Vec<&RankedRow> = indices[start.saturating_sub(window)..start]
                .iter()
                .map(|&i| &rows[i])
                .collect();
            for &i in &indices[start..start + same_date] {
                features[i] = window_features(&rows[i], &prior);
            }

            start += same_date;
        }
    }

    rows.into_iter()
        .zip(features)
        .map(|(ranked, history)| FeatureRow::new(ranked, history))
        .collect()
}

/// Features for `current` from its prior races, oldest first
pub fn window_features(current: &RankedRow, window: &[&RankedRow]) -> HistoryFeatures {
    let Some(last) = window.last() else {
        return HistoryFeatures::default();
    };

    let races = window.len() as f64;
    let rate = |limit: u32| {
        let hits = window
            .iter()
            .filter(|r| r.result.rank.is_some_and(|rank| rank <= limit))
            .count();
        hits as f64 / races
    };
    let avg_rank_where = |keep: &dyn Fn(&ResultRow) -> bool| {
        mean(
            window
                .iter()
                .filter(|r| keep(&r.result))
                .filter_map(|r| r.result.rank.map(f64::from)),
        )
    };

    let current_row = &current.result;

    HistoryFeatures {
        prior_races: window.len(),
        avg_rank: avg_rank_where(&|_| true),
        win_rate: Some(rate(1)),
        top2_rate: Some(rate(2)),
        top3_rate: Some(rate(3)),
        avg_rank_same_surface: avg_rank_where(&|r| r.surface == current_row.surface),
        avg_rank_same_distance: current_row.distance_category.and_then(|category| {
            avg_rank_where(&|r| r.distance_category == Some(category))
        }),
        days_since_last_race: match (current_row.race_date, last.result.race_date) {
            (Some(now), Some(then)) => Some((now - then).num_days()),
            _ => None,
        },
        last_race_rank: last.result.rank,
        last_race_popularity: last.result.popularity,
        weight_carried_diff: match (current_row.weight_carried, last.result.weight_carried) {
            (Some(now), Some(then)) => Some(now - then),
            _ => None,
        },
        best_last_3f: window
            .iter()
            .filter_map(|r| r.result.last_3f)
            .min_by(f64::total_cmp),
        count_last_3f_rank1: Some(
            window.iter().filter(|r| r.last_3f_rank == Some(1)).count() as u32,
        ),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::clean::clean_row;
    use crate::types::{RaceId, RawResultRow};

    struct Run<'a> {
        race_id: &'a str,
        horse_id: &'a str,
        rank: &'a str,
        distance: &'a str,
        track_code: &'a str,
        last_3f: &'a str,
    }

    fn run(race_id: &str, horse_id: &str, rank: &str) -> RankedRow {
        ranked(Run {
            race_id,
            horse_id,
            rank,
            distance: "1600",
            track_code: "11",
            last_3f: "35.0",
        })
    }

    fn ranked(run: Run<'_>) -> RankedRow {
        let result = clean_row(&RawResultRow {
            race_id: RaceId::parse(run.race_id).unwrap(),
            horse_id: run.horse_id.to_string(),
            rank: Some(run.rank.to_string()),
            popularity: Some("2".to_string()),
            distance: Some(run.distance.to_string()),
            track_code: Some(run.track_code.to_string()),
            weight_carried: Some("55".to_string()),
            last_3f: Some(run.last_3f.to_string()),
            ..Default::default()
        });
        RankedRow {
            result,
            last_3f_rank: Some(1),
        }
    }

    fn for_race<'a>(rows: &'a [FeatureRow], race_id: &str) -> &'a HistoryFeatures {
        &rows
            .iter()
            .find(|r| r.result.race_id.to_string() == race_id)
            .unwrap()
            .history
    }

    #[test]
    fn test_first_race_has_no_history() {
        let rows = add_history_features(vec![run("202201010101", "H", "1")], 5);
        assert_eq!(rows[0].history, HistoryFeatures::default());
    }

    #[test]
    fn test_window_uses_latest_n_prior_races() {
        // Six races on six dates: D6 sees D3, D4, D5 with a window of 3
        let rows = vec![
            run("202201010101", "H", "1"),
            run("202202010101", "H", "2"),
            run("202203010101", "H", "3"),
            run("202204010101", "H", "4"),
            run("202205010101", "H", "5"),
            run("202206010101", "H", "6"),
        ];
        let out = add_history_features(rows, 3);

        let d6 = for_race(&out, "202206010101");
        assert_eq!(d6.prior_races, 3);
        assert_eq!(d6.avg_rank, Some(4.0));
        assert_eq!(d6.last_race_rank, Some(5));
        assert_eq!(d6.days_since_last_race, Some(31));
        assert_eq!(d6.win_rate, Some(0.0));
        assert_eq!(d6.top3_rate, Some(1.0 / 3.0));

        let d2 = for_race(&out, "202202010101");
        assert_eq!(d2.prior_races, 1);
        assert_eq!(d2.win_rate, Some(1.0));
    }

    #[test]
    fn test_output_keeps_input_order() {
        let rows = vec![
            run("202203010101", "H", "3"),
            run("202201010101", "H", "1"),
            run("202202010101", "G", "2"),
        ];
        let out = add_history_features(rows, 5);
        let ids: Vec<String> = out.iter().map(|r| r.result.race_id.to_string()).collect();
        assert_eq!(ids, vec!["202203010101", "202201010101", "202202010101"]);
        assert_eq!(out[0].history.prior_races, 1);
        assert_eq!(out[2].history.prior_races, 0);
    }

    #[test]
    fn test_same_date_races_do_not_see_each_other() {
        let rows = vec![
            run("202201010101", "H", "4"),
            run("202205010101", "H", "1"),
            run("202205010102", "H", "2"),
        ];
        let out = add_history_features(rows, 5);

        assert_eq!(out[1].history.prior_races, 1);
        assert_eq!(out[2].history.prior_races, 1);
        assert_eq!(out[2].history.last_race_rank, Some(4));
    }

    #[test]
    fn test_last_race_is_highest_race_id_on_latest_date() {
        let rows = vec![
            run("202201010102", "H", "7"),
            run("202201010101", "H", "3"),
            run("202203010101", "H", "1"),
        ];
        let out = add_history_features(rows, 5);
        assert_eq!(out[2].history.last_race_rank, Some(7));
    }

    #[test]
    fn test_missing_ranks_count_as_non_wins() {
        let rows = vec![
            run("202201010101", "H", "1"),
            run("202202010101", "H", "00"),
            run("202203010101", "H", "2"),
        ];
        let out = add_history_features(rows, 5);
        let last = &out[2].history;

        assert_eq!(last.prior_races, 2);
        assert_eq!(last.win_rate, Some(0.5));
        assert_eq!(last.avg_rank, Some(1.0));
        assert_eq!(last.last_race_rank, None);
    }

    #[test]
    fn test_same_surface_and_distance_averages() {
        let rows = vec![
            ranked(Run {
                race_id: "202201010101",
                horse_id: "H",
                rank: "2",
                distance: "1200",
                track_code: "23",
                last_3f: "36.0",
            }),
            ranked(Run {
                race_id: "202202010101",
                horse_id: "H",
                rank: "6",
                distance: "2400",
                track_code: "11",
                last_3f: "34.5",
            }),
            ranked(Run {
                race_id: "202203010101",
                horse_id: "H",
                rank: "1",
                distance: "1800",
                track_code: "11",
                last_3f: "35.0",
            }),
        ];
        let out = add_history_features(rows, 5);
        let h = &out[2].history;

        assert_eq!(h.avg_rank, Some(4.0));
        assert_eq!(h.avg_rank_same_surface, Some(6.0));
        // No prior medium-distance race
        assert_eq!(h.avg_rank_same_distance, None);
        assert_eq!(h.best_last_3f, Some(34.5));
        assert_eq!(h.count_last_3f_rank1, Some(2));
        assert_eq!(h.weight_carried_diff, Some(0.0));
    }

    #[test]
    fn test_rates_are_ordered() {
        let rows: Vec<RankedRow> = ["3", "1", "2", "5", "1", "8"]
            .iter()
            .enumerate()
            .map(|(i, rank)| run(&format!("20220{}010101", i + 1), "H", rank))
            .collect();

        for row in add_history_features(rows, 4).iter().skip(1) {
            let h = &row.history;
            let (win, top2, top3) = (h.win_rate.unwrap(), h.top2_rate.unwrap(), h.top3_rate.unwrap());
            assert!((0.0..=1.0).contains(&win));
            assert!(win <= top2 && top2 <= top3 && top3 <= 1.0);
        }
    }

    #[test]
    fn test_rows_without_dates_get_empty_history() {
        let mut undated = run("202201010101", "H", "1");
        undated.result.race_date = None;
        let rows = vec![undated, run("202203010101", "H", "2")];

        let out = add_history_features(rows, 5);
        assert_eq!(out[0].history, HistoryFeatures::default());
        assert_eq!(out[1].history.prior_races, 0);
    }

    #[test]
    fn test_no_dates_at_all() {
        let mut row = run("202201010101", "H", "1");
        row.result.race_date = None;
        let out = add_history_features(vec![row], 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].history, HistoryFeatures::default());
    }

    #[test]
    fn test_horses_are_independent() {
        let rows = vec![
            run("202201010101", "A", "1"),
            run("202202010101", "B", "9"),
            run("202203010101", "A", "2"),
        ];
        let out = add_history_features(rows, 5);
        assert_eq!(out[1].history.prior_races, 0);
        assert_eq!(out[2].history.last_race_rank, Some(1));
    }
}
