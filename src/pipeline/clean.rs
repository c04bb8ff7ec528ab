//! Cleaning stage: raw coded result rows to typed rows.
//!
//! Coercion never fails. Non-numeric, empty and non-finite values become
//! `None`, unparseable race dates become `None` and are reported through
//! tracing: per row at debug level, once per batch as a warning.

use tracing::{debug, warn};

use crate::codes::{self, DistanceCategory, Sex, Surface, TrackCondition};
use crate::types::{RawResultRow, ResultRow};

/// Finishing-rank codes meaning "did not finish / disqualified"
const RANK_SENTINELS: [u32; 2] = [0, 99];

/// Clean a result set. Returns a new vector; the input is not modified.
pub fn clean_results(rows: &[RawResultRow]) -> Vec<ResultRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    let cleaned: Vec<ResultRow> = rows.iter().map(clean_row).collect();

    let missing_dates = cleaned.iter().filter(|r| r.race_date.is_none()).count();
    if missing_dates > 0 {
        warn!(
            "{} of {} rows have no parseable race date",
            missing_dates,
            cleaned.len()
        );
    }
    debug!("Cleaned {} result rows", cleaned.len());

    cleaned
}

/// Clean a single row
pub fn clean_row(raw: &RawResultRow) -> ResultRow {
    let race_date = raw.race_id.date();
    if race_date.is_none() {
        debug!(
            race_id = %raw.race_id,
            horse_id = %raw.horse_id,
            "Unparseable race date: year={:?} month_day={:?}",
            raw.race_id.year,
            raw.race_id.month_day
        );
    }

    let number = |field: &str, value: &Option<String>| {
        let parsed = parse_number(value.as_deref());
        if parsed.is_none() && value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
            debug!(
                race_id = %raw.race_id,
                horse_id = %raw.horse_id,
                "Non-numeric {} {:?} treated as missing",
                field,
                value
            );
        }
        parsed
    };

    let distance = number("distance", &raw.distance);

    ResultRow {
        race_id: raw.race_id.clone(),
        race_date,
        course_name: codes::course_name(&raw.race_id.course_code),
        distance,
        distance_category: distance.map(DistanceCategory::from_metres),
        track_code: non_empty(&raw.track_code),
        surface: raw
            .track_code
            .as_deref()
            .map(Surface::from_track_code)
            .unwrap_or(Surface::Other),
        weather_code: non_empty(&raw.weather_code),
        track_condition: raw
            .condition_code
            .as_deref()
            .map(TrackCondition::from_code)
            .unwrap_or(TrackCondition::Other),
        horse_id: raw.horse_id.trim().to_string(),
        horse_name: raw.horse_name.trim().to_string(),
        bracket: parse_count(raw.bracket.as_deref()),
        horse_number: parse_count(raw.horse_number.as_deref()),
        age: parse_count(raw.age.as_deref()),
        sex: raw
            .sex_code
            .as_deref()
            .map(Sex::from_code)
            .unwrap_or(Sex::Unknown),
        body_weight: number("body_weight", &raw.body_weight),
        weight_change: signed_weight_change(raw.weight_sign.as_deref(), raw.weight_diff.as_deref()),
        weight_carried: number("weight_carried", &raw.weight_carried),
        jockey_code: non_empty(&raw.jockey_code),
        jockey_name: non_empty(&raw.jockey_name),
        trainer_code: non_empty(&raw.trainer_code),
        trainer_name: non_empty(&raw.trainer_name),
        rank: parse_rank(raw.rank.as_deref()),
        popularity: parse_count(raw.popularity.as_deref()),
        odds: number("odds", &raw.odds),
        time: number("time", &raw.time),
        last_3f: number("last_3f", &raw.last_3f),
    }
}

/// Numeric coercion. Empty, non-numeric and non-finite values are `None`.
pub fn parse_number(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Non-negative integer coercion ("03" → 3). Fractional values are `None`.
pub fn parse_count(value: Option<&str>) -> Option<u32> {
    parse_number(value)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
}

/// Finishing rank. Sentinel codes "00"/"99" are `None`.
pub fn parse_rank(value: Option<&str>) -> Option<u32> {
    parse_count(value).filter(|r| !RANK_SENTINELS.contains(r))
}

/// Signed weight change from the sign flag and unsigned magnitude.
/// A missing magnitude counts as 0.
pub fn signed_weight_change(sign: Option<&str>, magnitude: Option<&str>) -> i32 {
    let magnitude = parse_number(magnitude).map(|v| v.round() as i32).unwrap_or(0);
    match sign.map(str::trim) {
        Some("-") => -magnitude.abs(),
        _ => magnitude,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
