//! Configuration for keiba-stats.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/keiba.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Rolling history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Number of prior races in the rolling window
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    crate::pipeline::DEFAULT_WINDOW
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

/// Configuration shared by the grouped ROI builders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default = "default_start_year")]
    pub start_year: u16,
    #[serde(default = "default_end_year")]
    pub end_year: u16,
    /// Groups with fewer entries than this are dropped
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Cap on races scanned by builders that walk race by race
    #[serde(default = "default_sample_races")]
    pub sample_races: usize,
}

fn default_start_year() -> u16 {
    2010
}

fn default_end_year() -> u16 {
    2020
}

fn default_min_samples() -> usize {
    1
}

fn default_sample_races() -> usize {
    10_000
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
            min_samples: default_min_samples(),
            sample_races: default_sample_races(),
        }
    }
}

impl BuilderConfig {
    pub fn new(start_year: u16, end_year: u16, min_samples: usize) -> Self {
        Self {
            start_year,
            end_year,
            min_samples,
            ..Default::default()
        }
    }

    fn with_min_samples(min_samples: usize) -> Self {
        Self {
            min_samples,
            ..Default::default()
        }
    }
}

fn default_sire_track() -> BuilderConfig {
    BuilderConfig::with_min_samples(30)
}

fn default_jockey_course() -> BuilderConfig {
    BuilderConfig::with_min_samples(20)
}

fn default_horse_course() -> BuilderConfig {
    BuilderConfig::with_min_samples(3)
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default = "default_sire_track")]
    pub sire_track: BuilderConfig,
    #[serde(default = "default_jockey_course")]
    pub jockey_course: BuilderConfig,
    #[serde(default = "default_horse_course")]
    pub horse_course: BuilderConfig,
    #[serde(default)]
    pub last_3f: BuilderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            features: FeatureConfig::default(),
            sire_track: default_sire_track(),
            jockey_course: default_jockey_course(),
            horse_course: default_horse_course(),
            last_3f: BuilderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `keiba_stats.toml` and environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `file` instead of the default config file
    pub fn load_from(file: Option<&Path>) -> anyhow::Result<Self> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("keiba_stats").required(false),
        };

        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file_source)
            // Override with environment variables (KEIBA_STATS_FEATURES__WINDOW, etc.)
            .add_source(
                config::Environment::with_prefix("KEIBA_STATS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
