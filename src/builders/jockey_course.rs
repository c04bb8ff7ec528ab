//! Jockey × (course, surface, distance category) ROI.

use serde::Serialize;
use std::fmt;

use super::{GroupSpec, RoiBuilder, RoiEntry};
use crate::codes::{DistanceCategory, Surface};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JockeyCourseKey {
    pub jockey_code: String,
    pub course_name: String,
    pub surface: Surface,
    pub distance: DistanceCategory,
}

impl fmt::Display for JockeyCourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.jockey_code, self.course_name, self.surface, self.distance
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct JockeyCourseFilter {
    pub course_name: Option<String>,
    pub surface: Option<Surface>,
    pub distance: Option<DistanceCategory>,
}

pub struct JockeyCourse;

impl GroupSpec for JockeyCourse {
    type Key = JockeyCourseKey;
    type Filter = JockeyCourseFilter;

    const NAME: &'static str = "jockey-course";

    fn keys(entry: &RoiEntry) -> Vec<JockeyCourseKey> {
        let jockey = entry.jockey_code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        match (jockey, entry.distance_category) {
            (Some(code), Some(distance)) => vec![JockeyCourseKey {
                jockey_code: code.to_string(),
                course_name: entry.course_name.clone(),
                surface: entry.surface,
                distance,
            }],
            _ => Vec::new(),
        }
    }

    fn label(entry: &RoiEntry) -> String {
        entry.jockey_name.clone().unwrap_or_default()
    }

    fn matches(key: &JockeyCourseKey, filter: &JockeyCourseFilter) -> bool {
        filter
            .course_name
            .as_ref()
            .map_or(true, |c| *c == key.course_name)
            && filter.surface.map_or(true, |s| s == key.surface)
            && filter.distance.map_or(true, |d| d == key.distance)
    }
}

pub type JockeyCourseBuilder<'a> = RoiBuilder<'a, JockeyCourse>;
