//! Sire × (surface, track condition) ROI.

use serde::Serialize;
use std::fmt;

use super::{GroupSpec, RoiBuilder, RoiEntry};
use crate::codes::{Surface, TrackCondition};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SireTrackKey {
    pub sire_name: String,
    pub surface: Surface,
    pub condition: TrackCondition,
}

impl fmt::Display for SireTrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.sire_name, self.surface, self.condition)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SireTrackFilter {
    pub surface: Option<Surface>,
    pub condition: Option<TrackCondition>,
}

pub struct SireTrack;

impl GroupSpec for SireTrack {
    type Key = SireTrackKey;
    type Filter = SireTrackFilter;

    const NAME: &'static str = "sire-track";
    const NEEDS_PEDIGREE: bool = true;

    fn keys(entry: &RoiEntry) -> Vec<SireTrackKey> {
        // Runners without a known sire are outside this population
        entry
            .sire_name
            .iter()
            .map(|sire| SireTrackKey {
                sire_name: sire.clone(),
                surface: entry.surface,
                condition: entry.track_condition,
            })
            .collect()
    }

    fn label(entry: &RoiEntry) -> String {
        entry.sire_name.clone().unwrap_or_default()
    }

    fn matches(key: &SireTrackKey, filter: &SireTrackFilter) -> bool {
        filter.surface.map_or(true, |s| s == key.surface)
            && filter.condition.map_or(true, |c| c == key.condition)
    }
}

pub type SireTrackBuilder<'a> = RoiBuilder<'a, SireTrack>;
