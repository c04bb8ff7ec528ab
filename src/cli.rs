//! CLI commands for keiba-stats.
//!
//! Feature preparation for a race or a horse, and queries against the four
//! grouped ROI tables.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use keiba_stats::builders::horse_course::HorseCourseBuilder;
use keiba_stats::builders::jockey_course::JockeyCourseBuilder;
use keiba_stats::builders::last_3f::Last3fBuilder;
use keiba_stats::builders::sire_track::SireTrackBuilder;
use keiba_stats::builders::{
    BuilderConfig, GroupAggregate, HorseCourseFilter, HorseCourseKey, JockeyCourseFilter,
    JockeyCourseKey, Last3fFilter, Last3fKey, SireTrackFilter, SireTrackKey,
};
use keiba_stats::codes::{self, DistanceCategory, PopularityGroup, Surface, TrackCondition};
use keiba_stats::config::AppConfig;
use keiba_stats::export::write_features;
use keiba_stats::pipeline::{horse_history, prepare_race, FeatureRow};
use keiba_stats::{RaceId, RaceRepository};

#[derive(Parser)]
#[command(name = "keiba-stats")]
#[command(version, about = "Keiba-Stats: historical race features and ROI tables", long_about = None)]
pub struct Cli {
    /// Config file (defaults to keiba_stats.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path override
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BuilderKind {
    SireTrack,
    JockeyCourse,
    HorseCourse,
    Last3f,
}

/// Overrides for a builder's configured year range and threshold
#[derive(Debug, Clone, Args)]
pub struct BuilderArgs {
    #[arg(long)]
    pub start_year: Option<u16>,

    #[arg(long)]
    pub end_year: Option<u16>,

    /// Minimum entries per group
    #[arg(long)]
    pub min_samples: Option<usize>,
}

impl BuilderArgs {
    fn apply(&self, base: &BuilderConfig) -> BuilderConfig {
        BuilderConfig {
            start_year: self.start_year.unwrap_or(base.start_year),
            end_year: self.end_year.unwrap_or(base.end_year),
            min_samples: self.min_samples.unwrap_or(base.min_samples),
            sample_races: base.sample_races,
        }
    }
}

/// Grouping dimensions. Which ones apply depends on the builder.
#[derive(Debug, Clone, Default, Args)]
pub struct Dimensions {
    /// Sire name
    #[arg(long)]
    pub sire: Option<String>,

    /// Jockey code
    #[arg(long)]
    pub jockey: Option<String>,

    /// Horse id
    #[arg(long)]
    pub horse: Option<String>,

    /// Course name or two-digit course code
    #[arg(long)]
    pub course: Option<String>,

    /// turf, dirt, other
    #[arg(long)]
    pub surface: Option<Surface>,

    /// good, slightly_heavy, heavy, bad, other
    #[arg(long)]
    pub condition: Option<TrackCondition>,

    /// short, medium, long
    #[arg(long)]
    pub distance: Option<DistanceCategory>,

    /// Popularity group: all, favorite, mid, longshot
    #[arg(long)]
    pub group: Option<PopularityGroup>,

    /// Final-furlong rank
    #[arg(long)]
    pub rank: Option<u32>,
}

impl Dimensions {
    fn course_name(&self) -> Option<String> {
        self.course.as_deref().map(|c| codes::course_name(c.trim()))
    }

    fn require<T: Clone>(value: &Option<T>, flag: &str, kind: BuilderKind) -> Result<T> {
        value
            .clone()
            .with_context(|| format!("--{} is required for {:?}", flag, kind))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    InitDb,

    /// Prepare feature rows for every runner of a race
    Features {
        /// 12-digit race id (YYYYMMDDCCRR)
        #[arg(value_name = "RACE_ID")]
        race_id: String,

        /// Rolling window override
        #[arg(short, long)]
        window: Option<usize>,

        /// Write the rows to a .parquet or .csv file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// A horse's recent races with features
    History {
        #[arg(value_name = "HORSE_ID")]
        horse_id: String,

        /// Number of races to show
        #[arg(short = 'n', long, default_value_t = 10)]
        races: usize,

        /// Rolling window override
        #[arg(short, long)]
        window: Option<usize>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Top groups by ROI for one builder
    Top {
        #[arg(value_enum)]
        kind: BuilderKind,

        #[arg(short = 'n', long, default_value_t = keiba_stats::builders::DEFAULT_TOP_N)]
        top_n: usize,

        #[command(flatten)]
        dims: Dimensions,

        #[command(flatten)]
        builder: BuilderArgs,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// ROI score of one group relative to the mean (mean = 100)
    Score {
        #[arg(value_enum)]
        kind: BuilderKind,

        #[command(flatten)]
        dims: Dimensions,

        #[command(flatten)]
        builder: BuilderArgs,
    },

    /// ROI by final-furlong rank for a popularity group
    Last3f {
        /// Popularity group: all, favorite, mid, longshot
        #[arg(short, long, default_value = "all")]
        group: PopularityGroup,

        /// Also print the ROI adjustment for this rank
        #[arg(long)]
        adjust: Option<f64>,

        #[command(flatten)]
        builder: BuilderArgs,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

fn open_repository(config: &AppConfig) -> Result<RaceRepository> {
    RaceRepository::new(Path::new(&config.database.path))
}

/// Create the schema in the configured database.
pub fn run_init_db(config: &AppConfig) -> Result<()> {
    let repo = open_repository(config)?;
    tracing::info!(
        "Database ready at {} ({} races, {} results)",
        config.database.path,
        repo.race_count()?,
        repo.result_count()?
    );
    Ok(())
}

/// Prepare and print (or export) features for one race.
pub fn run_features(
    config: &AppConfig,
    race_id: &str,
    window: Option<usize>,
    output: Option<PathBuf>,
    format: &str,
) -> Result<()> {
    let race_id = RaceId::parse(race_id)
        .with_context(|| format!("Invalid race id: {} (expected YYYYMMDDCCRR)", race_id))?;
    let repo = open_repository(config)?;

    let rows = prepare_race(&repo, &race_id, window.unwrap_or(config.features.window))?;

    if let Some(path) = output {
        let written = write_features(&rows, &path)?;
        eprintln!("Wrote {} rows to {}", written, path.display());
        return Ok(());
    }

    print_features(&rows, format, false)
}

/// Print a horse's recent races with features.
pub fn run_history(
    config: &AppConfig,
    horse_id: &str,
    races: usize,
    window: Option<usize>,
    format: &str,
) -> Result<()> {
    let repo = open_repository(config)?;
    let rows = horse_history(
        &repo,
        horse_id,
        races,
        window.unwrap_or(config.features.window),
    )?;
    print_features(&rows, format, true)
}

/// Print the top groups of one builder.
pub fn run_top(
    config: &AppConfig,
    kind: BuilderKind,
    top_n: usize,
    dims: &Dimensions,
    args: &BuilderArgs,
    format: &str,
) -> Result<()> {
    let repo = open_repository(config)?;

    match kind {
        BuilderKind::SireTrack => {
            let mut builder = SireTrackBuilder::new(&repo, args.apply(&config.sire_track));
            let filter = SireTrackFilter {
                surface: dims.surface,
                condition: dims.condition,
            };
            print_aggregates(&builder.get_top(&filter, top_n)?, format)
        }
        BuilderKind::JockeyCourse => {
            let mut builder = JockeyCourseBuilder::new(&repo, args.apply(&config.jockey_course));
            let filter = JockeyCourseFilter {
                course_name: dims.course_name(),
                surface: dims.surface,
                distance: dims.distance,
            };
            print_aggregates(&builder.get_top(&filter, top_n)?, format)
        }
        BuilderKind::HorseCourse => {
            let mut builder = HorseCourseBuilder::new(&repo, args.apply(&config.horse_course));
            let filter = HorseCourseFilter {
                horse_id: dims.horse.clone(),
                course_name: dims.course_name(),
                surface: dims.surface,
                distance: dims.distance,
            };
            print_aggregates(&builder.get_top(&filter, top_n)?, format)
        }
        BuilderKind::Last3f => {
            let mut builder = Last3fBuilder::new(&repo, args.apply(&config.last_3f));
            let filter = Last3fFilter {
                group: dims.group,
                last_3f_rank: dims.rank,
            };
            print_aggregates(&builder.get_top(&filter, top_n)?, format)
        }
    }
}

/// Print the normalised ROI score of one key.
pub fn run_score(
    config: &AppConfig,
    kind: BuilderKind,
    dims: &Dimensions,
    args: &BuilderArgs,
) -> Result<()> {
    let repo = open_repository(config)?;

    let (key, score) = match kind {
        BuilderKind::SireTrack => {
            let key = SireTrackKey {
                sire_name: Dimensions::require(&dims.sire, "sire", kind)?,
                surface: Dimensions::require(&dims.surface, "surface", kind)?,
                condition: Dimensions::require(&dims.condition, "condition", kind)?,
            };
            let mut builder = SireTrackBuilder::new(&repo, args.apply(&config.sire_track));
            let score = builder.get_score(&key)?;
            (key.to_string(), score)
        }
        BuilderKind::JockeyCourse => {
            let key = JockeyCourseKey {
                jockey_code: Dimensions::require(&dims.jockey, "jockey", kind)?,
                course_name: Dimensions::require(&dims.course_name(), "course", kind)?,
                surface: Dimensions::require(&dims.surface, "surface", kind)?,
                distance: Dimensions::require(&dims.distance, "distance", kind)?,
            };
            let mut builder = JockeyCourseBuilder::new(&repo, args.apply(&config.jockey_course));
            let score = builder.get_score(&key)?;
            (key.to_string(), score)
        }
        BuilderKind::HorseCourse => {
            let key = HorseCourseKey {
                horse_id: Dimensions::require(&dims.horse, "horse", kind)?,
                course_name: Dimensions::require(&dims.course_name(), "course", kind)?,
                surface: Dimensions::require(&dims.surface, "surface", kind)?,
                distance: Dimensions::require(&dims.distance, "distance", kind)?,
            };
            let mut builder = HorseCourseBuilder::new(&repo, args.apply(&config.horse_course));
            let score = builder.get_score(&key)?;
            (key.to_string(), score)
        }
        BuilderKind::Last3f => {
            let key = Last3fKey {
                group: dims.group.unwrap_or(PopularityGroup::All),
                last_3f_rank: Dimensions::require(&dims.rank, "rank", kind)?,
            };
            let mut builder = Last3fBuilder::new(&repo, args.apply(&config.last_3f));
            let score = builder.get_score(&key)?;
            (key.to_string(), score)
        }
    };

    println!("{}: {:.2}", key, score);
    Ok(())
}

/// Print the rank × ROI table of one popularity group.
pub fn run_last_3f(
    config: &AppConfig,
    group: PopularityGroup,
    adjust: Option<f64>,
    args: &BuilderArgs,
    format: &str,
) -> Result<()> {
    let repo = open_repository(config)?;
    let mut builder = Last3fBuilder::new(&repo, args.apply(&config.last_3f));

    let stats = builder.last_3f_roi_stats(group)?;
    print_aggregates(&stats, format)?;

    if let Some(rank) = adjust {
        let adjustment = builder.last_3f_roi_adjustment(rank, group)?;
        println!();
        println!("ROI adjustment for rank {} ({}): {:.3}", rank, group, adjustment);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_aggregates<K: Serialize + fmt::Display>(
    rows: &[GroupAggregate<K>],
    format: &str,
) -> Result<()> {
    match format {
        "json" => print_json(rows),
        "table" => {
            print_aggregate_table(rows);
            Ok(())
        }
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            print_json(rows)
        }
    }
}

fn print_aggregate_table<K: fmt::Display>(rows: &[GroupAggregate<K>]) {
    if rows.is_empty() {
        println!("No groups found");
        return;
    }

    println!(
        "{:<56} {:>6} {:>5} {:>7} {:>8} {:>7} {:>7} {:>8}",
        "Group", "Runs", "Wins", "Win%", "ROI%", "Top3%", "AvgPop", "AvgOdds"
    );
    for row in rows {
        let group = if row.label.is_empty() {
            row.key.to_string()
        } else {
            format!("{} ({})", row.key, row.label)
        };
        println!(
            "{:<56} {:>6} {:>5} {:>7.1} {:>8.1} {:>7.1} {:>7.2} {:>8.1}",
            group,
            row.total,
            row.wins,
            row.win_rate,
            row.roi,
            row.top3_rate,
            row.avg_popularity,
            row.avg_odds
        );
    }
}

fn print_features(rows: &[FeatureRow], format: &str, with_race: bool) -> Result<()> {
    match format {
        "json" => print_json(rows),
        "table" => {
            print_feature_table(rows, with_race);
            Ok(())
        }
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            print_json(rows)
        }
    }
}

fn print_feature_table(rows: &[FeatureRow], with_race: bool) {
    if rows.is_empty() {
        println!("No rows found");
        return;
    }

    println!(
        "{:<12} {:>3} {:<20} {:>4} {:>4} {:>5} {:>7} {:>6} {:>6} {:>5} {:>6}",
        "Race", "No", "Horse", "Rank", "3F", "Prior", "AvgRnk", "Win%", "Top3%", "Days", "Best3F"
    );
    for row in rows {
        let race = if with_race {
            row.result
                .race_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| row.result.race_id.to_string())
        } else {
            row.result.race_id.to_string()
        };
        let h = &row.history;
        println!(
            "{:<12} {:>3} {:<20} {:>4} {:>4} {:>5} {:>7} {:>6} {:>6} {:>5} {:>6}",
            race,
            opt(row.result.horse_number),
            row.result.horse_name,
            opt(row.result.rank),
            opt(row.last_3f_rank),
            h.prior_races,
            opt_f(h.avg_rank, 2),
            opt_f(h.win_rate.map(|r| r * 100.0), 1),
            opt_f(h.top3_rate.map(|r| r * 100.0), 1),
            opt(h.days_since_last_race),
            opt_f(h.best_last_3f, 1),
        );
    }
}

fn opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn opt_f(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_top_with_dimensions() {
        let cli = Cli::try_parse_from([
            "keiba-stats",
            "top",
            "jockey-course",
            "--course",
            "05",
            "--surface",
            "turf",
            "--distance",
            "medium",
            "-n",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Top {
                kind, top_n, dims, ..
            } => {
                assert!(matches!(kind, BuilderKind::JockeyCourse));
                assert_eq!(top_n, 5);
                assert_eq!(dims.course_name().as_deref(), Some("東京"));
                assert_eq!(dims.surface, Some(Surface::Turf));
                assert_eq!(dims.distance, Some(DistanceCategory::Medium));
            }
            _ => panic!("expected top"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_surface() {
        let result = Cli::try_parse_from(["keiba-stats", "top", "sire-track", "--surface", "ice"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_args_override() {
        let args = BuilderArgs {
            start_year: Some(2015),
            end_year: None,
            min_samples: Some(5),
        };
        let config = args.apply(&BuilderConfig::new(2010, 2020, 30));
        assert_eq!(config.start_year, 2015);
        assert_eq!(config.end_year, 2020);
        assert_eq!(config.min_samples, 5);
        assert_eq!(config.sample_races, 10_000);
    }

    #[test]
    fn test_score_requires_key_dimensions() {
        let dims = Dimensions::default();
        assert!(Dimensions::require(&dims.sire, "sire", BuilderKind::SireTrack).is_err());
    }

    #[test]
    fn test_opt_formatting() {
        assert_eq!(opt::<u32>(None), "-");
        assert_eq!(opt(Some(3)), "3");
        assert_eq!(opt_f(Some(0.456), 1), "0.5");
    }
}
