//! Horse × (course, surface, distance category) ROI.

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use super::{GroupAggregate, GroupSpec, RoiBuilder, RoiEntry};
use crate::codes::{DistanceCategory, Surface};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HorseCourseKey {
    pub horse_id: String,
    pub course_name: String,
    pub surface: Surface,
    pub distance: DistanceCategory,
}

impl fmt::Display for HorseCourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.horse_id, self.course_name, self.surface, self.distance
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct HorseCourseFilter {
    pub horse_id: Option<String>,
    pub course_name: Option<String>,
    pub surface: Option<Surface>,
    pub distance: Option<DistanceCategory>,
}

pub struct HorseCourse;

impl GroupSpec for HorseCourse {
    type Key = HorseCourseKey;
    type Filter = HorseCourseFilter;

    const NAME: &'static str = "horse-course";

    fn keys(entry: &RoiEntry) -> Vec<HorseCourseKey> {
        entry
            .distance_category
            .map(|distance| HorseCourseKey {
                horse_id: entry.horse_id.clone(),
                course_name: entry.course_name.clone(),
                surface: entry.surface,
                distance,
            })
            .into_iter()
            .collect()
    }

    fn label(entry: &RoiEntry) -> String {
        entry.horse_name.clone()
    }

    fn matches(key: &HorseCourseKey, filter: &HorseCourseFilter) -> bool {
        filter.horse_id.as_ref().map_or(true, |h| *h == key.horse_id)
            && filter
                .course_name
                .as_ref()
                .map_or(true, |c| *c == key.course_name)
            && filter.surface.map_or(true, |s| s == key.surface)
            && filter.distance.map_or(true, |d| d == key.distance)
    }
}

pub type HorseCourseBuilder<'a> = RoiBuilder<'a, HorseCourse>;

impl RoiBuilder<'_, HorseCourse> {
    /// Every cached course row for one horse, best ROI first
    pub fn horse_course_history(
        &mut self,
        horse_id: &str,
    ) -> Result<Vec<GroupAggregate<HorseCourseKey>>> {
        let rows = self.build(false)?;
        Ok(rows
            .iter()
            .filter(|row| row.key.horse_id == horse_id)
            .cloned()
            .collect())
    }
}
