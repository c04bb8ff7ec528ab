//! Derived-rank stage: final-furlong rank within each race.

use serde::Serialize;
use std::collections::HashMap;

use crate::types::{RaceId, ResultRow};

/// A cleaned row with its last-3F rank inside its race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    #[serde(flatten)]
    pub result: ResultRow,
    /// 1 = fastest; ties share the smallest rank
    pub last_3f_rank: Option<u32>,
}

/// Standard competition ranking ("1224") of ascending values.
/// Missing values stay unranked.
pub fn competition_ranks(values: &[Option<f64>]) -> Vec<Option<u32>> {
    let mut valued: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    valued.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![None; values.len()];
    let mut previous: Option<(f64, u32)> = None;
    for (position, &(index, value)) in valued.iter().enumerate() {
        let rank = match previous {
            Some((prev_value, prev_rank)) if prev_value == value => prev_rank,
            _ => position as u32 + 1,
        };
        ranks[index] = Some(rank);
        previous = Some((value, rank));
    }
    ranks
}

/// Rank every row's last-3F time within its race. Row order is preserved.
pub fn rank_last_3f(rows: Vec<ResultRow>) -> Vec<RankedRow> {
    let mut by_race: HashMap<&RaceId, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_race.entry(&row.race_id).or_default().push(i);
    }

    let mut ranks = vec![None; rows.len()];
    for indices in by_race.values() {
        let times: Vec<Option<f64>> = indices.iter().map(|&i| rows[i].last_3f).collect();
        for (&i, rank) in indices.iter().zip(competition_ranks(&times)) {
            ranks[i] = rank;
        }
    }

    rows.into_iter()
        .zip(ranks)
        .map(|(result, last_3f_rank)| RankedRow {
            result,
            last_3f_rank,
        })
        .collect()
}
