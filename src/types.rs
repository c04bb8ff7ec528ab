//! Record types shared by the query layer and the feature pipeline.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::codes::{self, DistanceCategory, Sex, Surface, TrackCondition};

/// Unique race identifier: year, month-day, course code and race number.
///
/// Renders as the 12-digit concatenation `YYYYMMDDCCRR`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceId {
    pub year: String,
    pub month_day: String,
    pub course_code: String,
    pub race_number: String,
}

fn race_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})(\d{4})(\d{2})(\d{2})$").unwrap())
}

impl RaceId {
    pub fn new(year: &str, month_day: &str, course_code: &str, race_number: &str) -> Self {
        Self {
            year: year.to_string(),
            month_day: month_day.to_string(),
            course_code: course_code.to_string(),
            race_number: race_number.to_string(),
        }
    }

    /// Parse a 12-digit race id (`202201050511`).
    pub fn parse(s: &str) -> Option<Self> {
        let caps = race_id_pattern().captures(s.trim())?;
        Some(Self::new(&caps[1], &caps[2], &caps[3], &caps[4]))
    }

    /// Race date from year + month-day. `None` if the combination is not a
    /// calendar date.
    pub fn date(&self) -> Option<NaiveDate> {
        let joined = format!("{}{}", self.year.trim(), self.month_day.trim());
        NaiveDate::parse_from_str(&joined, "%Y%m%d").ok()
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.year, self.month_day, self.course_code, self.race_number
        )
    }
}

/// One race occurrence as stored (codes kept raw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub race_id: RaceId,
    pub distance: Option<String>,
    pub track_code: Option<String>,
    pub weather_code: Option<String>,
    pub turf_condition_code: Option<String>,
    pub dirt_condition_code: Option<String>,
}

impl RaceRecord {
    pub fn course_name(&self) -> String {
        codes::course_name(&self.race_id.course_code)
    }

    pub fn surface(&self) -> Surface {
        self.track_code
            .as_deref()
            .map(Surface::from_track_code)
            .unwrap_or(Surface::Other)
    }

    pub fn distance_metres(&self) -> Option<f64> {
        self.distance
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite())
    }

    pub fn distance_category(&self) -> Option<DistanceCategory> {
        self.distance_metres().map(DistanceCategory::from_metres)
    }

    /// Going code: the turf code on turf, otherwise the dirt code.
    pub fn condition_code(&self) -> Option<&str> {
        match self.surface() {
            Surface::Turf => self.turf_condition_code.as_deref(),
            _ => self.dirt_condition_code.as_deref(),
        }
    }

    pub fn track_condition(&self) -> TrackCondition {
        self.condition_code()
            .map(TrackCondition::from_code)
            .unwrap_or(TrackCondition::Other)
    }
}

/// One horse's participation in one race, as returned by the query layer.
///
/// Coded and numeric fields are still strings; odds and final-furlong time
/// are already scaled from tenths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResultRow {
    pub race_id: RaceId,
    pub distance: Option<String>,
    pub track_code: Option<String>,
    pub weather_code: Option<String>,
    pub condition_code: Option<String>,
    pub horse_id: String,
    pub horse_name: String,
    pub bracket: Option<String>,
    pub horse_number: Option<String>,
    pub age: Option<String>,
    pub sex_code: Option<String>,
    pub body_weight: Option<String>,
    pub weight_sign: Option<String>,
    pub weight_diff: Option<String>,
    pub weight_carried: Option<String>,
    pub jockey_code: Option<String>,
    pub jockey_name: Option<String>,
    pub trainer_code: Option<String>,
    pub trainer_name: Option<String>,
    pub rank: Option<String>,
    pub popularity: Option<String>,
    pub odds: Option<String>,
    pub time: Option<String>,
    pub last_3f: Option<String>,
}

/// A cleaned result row with typed values and derived categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub race_id: RaceId,
    pub race_date: Option<NaiveDate>,
    pub course_name: String,
    pub distance: Option<f64>,
    pub distance_category: Option<DistanceCategory>,
    pub track_code: Option<String>,
    pub surface: Surface,
    pub weather_code: Option<String>,
    pub track_condition: TrackCondition,
    pub horse_id: String,
    pub horse_name: String,
    pub bracket: Option<u32>,
    pub horse_number: Option<u32>,
    pub age: Option<u32>,
    pub sex: Sex,
    pub body_weight: Option<f64>,
    /// Signed body weight change in kg (0 when not reported)
    pub weight_change: i32,
    pub weight_carried: Option<f64>,
    pub jockey_code: Option<String>,
    pub jockey_name: Option<String>,
    pub trainer_code: Option<String>,
    pub trainer_name: Option<String>,
    /// Finishing position. `None` for scratches and disqualifications.
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
    pub odds: Option<f64>,
    pub time: Option<f64>,
    /// Final-furlong (last 600m) time in seconds
    pub last_3f: Option<f64>,
}

/// Pedigree and birth data for a horse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseProfile {
    pub horse_id: String,
    pub horse_name: String,
    pub birth_date: Option<NaiveDate>,
    pub sire_id: Option<String>,
    pub sire_name: Option<String>,
    pub dam_id: Option<String>,
    pub dam_name: Option<String>,
}

impl HorseProfile {
    /// Sire name if it is a real name (not blank, not the all-zero placeholder).
    pub fn known_sire(&self) -> Option<&str> {
        self.sire_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.chars().all(|c| c == '0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_id_roundtrip() {
        let id = RaceId::parse("202201050511").unwrap();
        assert_eq!(id.year, "2022");
        assert_eq!(id.month_day, "0105");
        assert_eq!(id.course_code, "05");
        assert_eq!(id.race_number, "11");
        assert_eq!(id.to_string(), "202201050511");
    }

    #[test]
    fn test_race_id_parse_rejects_bad_input() {
        assert!(RaceId::parse("2022010505").is_none());
        assert!(RaceId::parse("2022-1-05-05-11").is_none());
        assert!(RaceId::parse("").is_none());
    }

    #[test]
    fn test_race_id_date() {
        let id = RaceId::new("2022", "0105", "05", "11");
        assert_eq!(id.date(), NaiveDate::from_ymd_opt(2022, 1, 5));

        let bad = RaceId::new("2022", "0231", "05", "11");
        assert!(bad.date().is_none());
    }

    #[test]
    fn test_race_record_condition_by_surface() {
        let mut race = RaceRecord {
            race_id: RaceId::new("2022", "0105", "06", "01"),
            distance: Some("1800".to_string()),
            track_code: Some("11".to_string()),
            weather_code: Some("1".to_string()),
            turf_condition_code: Some("2".to_string()),
            dirt_condition_code: Some("3".to_string()),
        };
        assert_eq!(race.surface(), Surface::Turf);
        assert_eq!(race.track_condition(), TrackCondition::SlightlyHeavy);
        assert_eq!(race.distance_category(), Some(DistanceCategory::Medium));
        assert_eq!(race.course_name(), "中山");

        race.track_code = Some("24".to_string());
        assert_eq!(race.surface(), Surface::Dirt);
        assert_eq!(race.track_condition(), TrackCondition::Heavy);
    }

    #[test]
    fn test_known_sire() {
        let mut profile = HorseProfile {
            horse_id: "2019100001".to_string(),
            horse_name: "Test".to_string(),
            birth_date: None,
            sire_id: Some("1".to_string()),
            sire_name: Some(" ディープインパクト ".to_string()),
            dam_id: None,
            dam_name: None,
        };
        assert_eq!(profile.known_sire(), Some("ディープインパクト"));

        profile.sire_name = Some("0000000000".to_string());
        assert!(profile.known_sire().is_none());

        profile.sire_name = Some(String::new());
        assert!(profile.known_sire().is_none());
    }
}
