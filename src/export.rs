//! Feature table export for model training.

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::pipeline::FeatureRow;

/// Feature rows as a polars `DataFrame`, one column per field
pub fn features_to_dataframe(rows: &[FeatureRow]) -> Result<DataFrame> {
    let columns = vec![
        Column::new(
            "race_id".into(),
            rows.iter().map(|r| r.result.race_id.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "race_date".into(),
            rows.iter()
                .map(|r| r.result.race_date.map(|d| d.format("%Y-%m-%d").to_string()))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "course_name".into(),
            rows.iter().map(|r| r.result.course_name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "distance".into(),
            rows.iter().map(|r| r.result.distance).collect::<Vec<_>>(),
        ),
        Column::new(
            "distance_category".into(),
            rows.iter()
                .map(|r| r.result.distance_category.map(|c| c.as_str()))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "surface".into(),
            rows.iter().map(|r| r.result.surface.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "track_condition".into(),
            rows.iter().map(|r| r.result.track_condition.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "horse_id".into(),
            rows.iter().map(|r| r.result.horse_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "horse_name".into(),
            rows.iter().map(|r| r.result.horse_name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "horse_number".into(),
            rows.iter().map(|r| r.result.horse_number).collect::<Vec<_>>(),
        ),
        Column::new(
            "age".into(),
            rows.iter().map(|r| r.result.age).collect::<Vec<_>>(),
        ),
        Column::new(
            "sex".into(),
            rows.iter().map(|r| r.result.sex.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "body_weight".into(),
            rows.iter().map(|r| r.result.body_weight).collect::<Vec<_>>(),
        ),
        Column::new(
            "weight_change".into(),
            rows.iter().map(|r| r.result.weight_change).collect::<Vec<_>>(),
        ),
        Column::new(
            "weight_carried".into(),
            rows.iter().map(|r| r.result.weight_carried).collect::<Vec<_>>(),
        ),
        Column::new(
            "jockey_code".into(),
            rows.iter().map(|r| r.result.jockey_code.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "trainer_code".into(),
            rows.iter().map(|r| r.result.trainer_code.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "rank".into(),
            rows.iter().map(|r| r.result.rank).collect::<Vec<_>>(),
        ),
        Column::new(
            "popularity".into(),
            rows.iter().map(|r| r.result.popularity).collect::<Vec<_>>(),
        ),
        Column::new(
            "odds".into(),
            rows.iter().map(|r| r.result.odds).collect::<Vec<_>>(),
        ),
        Column::new(
            "time".into(),
            rows.iter().map(|r| r.result.time).collect::<Vec<_>>(),
        ),
        Column::new(
            "last_3f".into(),
            rows.iter().map(|r| r.result.last_3f).collect::<Vec<_>>(),
        ),
        Column::new(
            "last_3f_rank".into(),
            rows.iter().map(|r| r.last_3f_rank).collect::<Vec<_>>(),
        ),
        // Rolling history
        Column::new(
            "prior_races".into(),
            rows.iter().map(|r| r.history.prior_races as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "avg_rank".into(),
            rows.iter().map(|r| r.history.avg_rank).collect::<Vec<_>>(),
        ),
        Column::new(
            "win_rate".into(),
            rows.iter().map(|r| r.history.win_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "top2_rate".into(),
            rows.iter().map(|r| r.history.top2_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "top3_rate".into(),
            rows.iter().map(|r| r.history.top3_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "avg_rank_same_surface".into(),
            rows.iter().map(|r| r.history.avg_rank_same_surface).collect::<Vec<_>>(),
        ),
        Column::new(
            "avg_rank_same_distance".into(),
            rows.iter().map(|r| r.history.avg_rank_same_distance).collect::<Vec<_>>(),
        ),
        Column::new(
            "days_since_last_race".into(),
            rows.iter().map(|r| r.history.days_since_last_race).collect::<Vec<_>>(),
        ),
        Column::new(
            "last_race_rank".into(),
            rows.iter().map(|r| r.history.last_race_rank).collect::<Vec<_>>(),
        ),
        Column::new(
            "last_race_popularity".into(),
            rows.iter().map(|r| r.history.last_race_popularity).collect::<Vec<_>>(),
        ),
        Column::new(
            "weight_carried_diff".into(),
            rows.iter().map(|r| r.history.weight_carried_diff).collect::<Vec<_>>(),
        ),
        Column::new(
            "best_last_3f".into(),
            rows.iter().map(|r| r.history.best_last_3f).collect::<Vec<_>>(),
        ),
        Column::new(
            "count_last_3f_rank1".into(),
            rows.iter().map(|r| r.history.count_last_3f_rank1).collect::<Vec<_>>(),
        ),
    ];

    Ok(DataFrame::new(columns)?)
}

/// Write feature rows as Parquet. Returns the number of rows written.
pub fn write_parquet(rows: &[FeatureRow], path: &Path) -> Result<usize> {
    let mut df = features_to_dataframe(rows)?;
    let mut file = create_file(path)?;

    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write Parquet: {}", path.display()))?;

    info!("Wrote {} feature rows to {}", df.height(), path.display());
    Ok(df.height())
}

/// Write feature rows as CSV with a header. Returns the number of rows written.
pub fn write_csv(rows: &[FeatureRow], path: &Path) -> Result<usize> {
    let mut df = features_to_dataframe(rows)?;
    let mut file = create_file(path)?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV: {}", path.display()))?;

    info!("Wrote {} feature rows to {}", df.height(), path.display());
    Ok(df.height())
}

/// Write by file extension (`.parquet` or `.csv`)
pub fn write_features(rows: &[FeatureRow], path: &Path) -> Result<usize> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => write_parquet(rows, path),
        Some("csv") => write_csv(rows, path),
        _ => bail!(
            "Unsupported export format: {} (expected .parquet or .csv)",
            path.display()
        ),
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))
}
