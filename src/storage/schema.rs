//! SQLite schema definitions for historical race data
//!
//! Tables mirror the JV-Data layout: codes and numeric fields are stored as
//! raw text exactly as delivered, odds and final-furlong times in tenths.
//! - races: one row per race (year, month-day, course, race number)
//! - race_results: one row per horse per race
//! - horses: pedigree and birth data

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            year TEXT NOT NULL,
            month_day TEXT NOT NULL,
            course_code TEXT NOT NULL,
            race_number TEXT NOT NULL,
            distance TEXT,
            track_code TEXT,
            weather_code TEXT,
            turf_condition_code TEXT,
            dirt_condition_code TEXT,
            PRIMARY KEY (year, month_day, course_code, race_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_results (
            year TEXT NOT NULL,
            month_day TEXT NOT NULL,
            course_code TEXT NOT NULL,
            race_number TEXT NOT NULL,
            horse_id TEXT NOT NULL,
            horse_name TEXT,
            bracket TEXT,
            horse_number TEXT,
            age TEXT,
            sex_code TEXT,
            body_weight TEXT,
            weight_sign TEXT,
            weight_diff TEXT,
            weight_carried TEXT,
            jockey_code TEXT,
            jockey_name TEXT,
            trainer_code TEXT,
            trainer_name TEXT,
            finish_rank TEXT,
            popularity TEXT,
            win_odds TEXT,
            finish_time TEXT,
            last_3f TEXT,
            PRIMARY KEY (year, month_day, course_code, race_number, horse_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horses (
            horse_id TEXT PRIMARY KEY,
            horse_name TEXT,
            birth_date TEXT,
            sire_id TEXT,
            sire_name TEXT,
            dam_id TEXT,
            dam_name TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_races_year ON races(year, month_day)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_race_results_horse ON race_results(horse_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_race_results_year ON race_results(year, month_day)",
        [],
    )?;

    Ok(())
}
