//! Static lookup tables for JRA coded fields.
//!
//! Every table has an explicit fallback for codes it does not know:
//! unknown courses keep their raw code, unknown surfaces and conditions map
//! to `Other`, unknown sexes to `Unknown`.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course code → course name
const COURSES: [(&str, &str); 10] = [
    ("01", "札幌"),
    ("02", "函館"),
    ("03", "福島"),
    ("04", "新潟"),
    ("05", "東京"),
    ("06", "中山"),
    ("07", "中京"),
    ("08", "京都"),
    ("09", "阪神"),
    ("10", "小倉"),
];

/// Upper bound (inclusive, metres) of the short distance category
pub const SHORT_MAX_METRES: f64 = 1400.0;
/// Upper bound (inclusive, metres) of the medium distance category
pub const MEDIUM_MAX_METRES: f64 = 2000.0;

/// Resolve a course code to its name, falling back to the raw code.
pub fn course_name(code: &str) -> String {
    let code = code.trim();
    COURSES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Track surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Turf,
    Dirt,
    Other,
}

impl Surface {
    /// The first character of the track code selects the surface.
    pub fn from_track_code(code: &str) -> Self {
        match code.trim().chars().next() {
            Some('1') => Surface::Turf,
            Some('2') => Surface::Dirt,
            _ => Surface::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Turf => "turf",
            Surface::Dirt => "dirt",
            Surface::Other => "other",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "turf" | "芝" => Ok(Surface::Turf),
            "dirt" | "ダート" => Ok(Surface::Dirt),
            "other" | "その他" => Ok(Surface::Other),
            other => bail!("unknown surface: {}", other),
        }
    }
}

/// Going (track condition)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCondition {
    Good,          // 良
    SlightlyHeavy, // 稍重
    Heavy,         // 重
    Bad,           // 不良
    Other,
}

impl TrackCondition {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => TrackCondition::Good,
            "2" => TrackCondition::SlightlyHeavy,
            "3" => TrackCondition::Heavy,
            "4" => TrackCondition::Bad,
            _ => TrackCondition::Other,
        }
    }

    /// Source code for this condition (`Other` encodes as "0")
    pub fn code(&self) -> &'static str {
        match self {
            TrackCondition::Good => "1",
            TrackCondition::SlightlyHeavy => "2",
            TrackCondition::Heavy => "3",
            TrackCondition::Bad => "4",
            TrackCondition::Other => "0",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackCondition::Good => "good",
            TrackCondition::SlightlyHeavy => "slightly_heavy",
            TrackCondition::Heavy => "heavy",
            TrackCondition::Bad => "bad",
            TrackCondition::Other => "other",
        }
    }
}

impl fmt::Display for TrackCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackCondition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "good" | "良" => Ok(TrackCondition::Good),
            "slightly_heavy" | "slightly-heavy" | "稍重" => Ok(TrackCondition::SlightlyHeavy),
            "heavy" | "重" => Ok(TrackCondition::Heavy),
            "bad" | "不良" => Ok(TrackCondition::Bad),
            "other" | "その他" => Ok(TrackCondition::Other),
            other => bail!("unknown track condition: {}", other),
        }
    }
}

/// Horse sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,    // 牡
    Female,  // 牝
    Gelding, // セン
    Unknown,
}

impl Sex {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => Sex::Male,
            "2" => Sex::Female,
            "3" => Sex::Gelding,
            _ => Sex::Unknown,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "1",
            Sex::Female => "2",
            Sex::Gelding => "3",
            Sex::Unknown => "0",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Gelding => "gelding",
            Sex::Unknown => "unknown",
        }
    }
}

/// Distance category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceCategory {
    Short,  // ~1400m
    Medium, // ~2000m
    Long,
}

impl DistanceCategory {
    pub fn from_metres(distance: f64) -> Self {
        if distance <= SHORT_MAX_METRES {
            DistanceCategory::Short
        } else if distance <= MEDIUM_MAX_METRES {
            DistanceCategory::Medium
        } else {
            DistanceCategory::Long
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceCategory::Short => "short",
            DistanceCategory::Medium => "medium",
            DistanceCategory::Long => "long",
        }
    }
}

impl fmt::Display for DistanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" | "短距離" => Ok(DistanceCategory::Short),
            "medium" | "中距離" => Ok(DistanceCategory::Medium),
            "long" | "長距離" => Ok(DistanceCategory::Long),
            other => bail!("unknown distance category: {}", other),
        }
    }
}

/// Betting popularity band used by the final-furlong ROI table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopularityGroup {
    All,
    Favorite, // 1-3
    Mid,      // 4-8
    Longshot, // 9+
}

impl PopularityGroup {
    /// Band for a popularity rank. `None` for rank 0.
    pub fn band(popularity: u32) -> Option<Self> {
        match popularity {
            1..=3 => Some(PopularityGroup::Favorite),
            4..=8 => Some(PopularityGroup::Mid),
            9.. => Some(PopularityGroup::Longshot),
            0 => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PopularityGroup::All => "all",
            PopularityGroup::Favorite => "favorite",
            PopularityGroup::Mid => "mid",
            PopularityGroup::Longshot => "longshot",
        }
    }
}

impl fmt::Display for PopularityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PopularityGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(PopularityGroup::All),
            "favorite" => Ok(PopularityGroup::Favorite),
            "mid" => Ok(PopularityGroup::Mid),
            "longshot" => Ok(PopularityGroup::Longshot),
            other => bail!("unknown popularity group: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_name() {
        assert_eq!(course_name("05"), "東京");
        assert_eq!(course_name("10"), "小倉");
        // Unknown codes keep the raw code
        assert_eq!(course_name("42"), "42");
    }

    #[test]
    fn test_surface_from_track_code() {
        assert_eq!(Surface::from_track_code("11"), Surface::Turf);
        assert_eq!(Surface::from_track_code("23"), Surface::Dirt);
        assert_eq!(Surface::from_track_code("51"), Surface::Other);
        assert_eq!(Surface::from_track_code(""), Surface::Other);
    }

    #[test]
    fn test_track_condition_from_code() {
        assert_eq!(TrackCondition::from_code("1"), TrackCondition::Good);
        assert_eq!(TrackCondition::from_code("2"), TrackCondition::SlightlyHeavy);
        assert_eq!(TrackCondition::from_code("3"), TrackCondition::Heavy);
        assert_eq!(TrackCondition::from_code("4"), TrackCondition::Bad);
        assert_eq!(TrackCondition::from_code("0"), TrackCondition::Other);
        assert_eq!(TrackCondition::from_code("9"), TrackCondition::Other);
    }

    #[test]
    fn test_sex_from_code() {
        assert_eq!(Sex::from_code("1"), Sex::Male);
        assert_eq!(Sex::from_code("2"), Sex::Female);
        assert_eq!(Sex::from_code("3"), Sex::Gelding);
        assert_eq!(Sex::from_code("0"), Sex::Unknown);
        assert_eq!(Sex::from_code("x"), Sex::Unknown);
    }

    #[test]
    fn test_distance_category_boundaries() {
        assert_eq!(DistanceCategory::from_metres(1200.0), DistanceCategory::Short);
        assert_eq!(DistanceCategory::from_metres(1400.0), DistanceCategory::Short);
        assert_eq!(DistanceCategory::from_metres(1600.0), DistanceCategory::Medium);
        assert_eq!(DistanceCategory::from_metres(2000.0), DistanceCategory::Medium);
        assert_eq!(DistanceCategory::from_metres(2400.0), DistanceCategory::Long);
    }

    #[test]
    fn test_popularity_band() {
        assert_eq!(PopularityGroup::band(1), Some(PopularityGroup::Favorite));
        assert_eq!(PopularityGroup::band(3), Some(PopularityGroup::Favorite));
        assert_eq!(PopularityGroup::band(4), Some(PopularityGroup::Mid));
        assert_eq!(PopularityGroup::band(8), Some(PopularityGroup::Mid));
        assert_eq!(PopularityGroup::band(9), Some(PopularityGroup::Longshot));
        assert_eq!(PopularityGroup::band(0), None);
    }

    #[test]
    fn test_from_str_accepts_japanese_labels() {
        assert_eq!("芝".parse::<Surface>().unwrap(), Surface::Turf);
        assert_eq!("ダート".parse::<Surface>().unwrap(), Surface::Dirt);
        assert_eq!("稍重".parse::<TrackCondition>().unwrap(), TrackCondition::SlightlyHeavy);
        assert_eq!("中距離".parse::<DistanceCategory>().unwrap(), DistanceCategory::Medium);
        assert!("mud".parse::<Surface>().is_err());
    }
}
