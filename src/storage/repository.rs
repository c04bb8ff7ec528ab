//! SQLite repository for historical race data

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use tracing::debug;

use super::schema::create_tables;
use crate::source::{RaceFilter, RaceSource};
use crate::types::{HorseProfile, RaceId, RaceRecord, RawResultRow};

/// A result row as stored: raw codes, odds and final-furlong time in tenths
#[derive(Debug, Clone, Default)]
pub struct StoredResult {
    pub race_id: RaceId,
    pub horse_id: String,
    pub horse_name: Option<String>,
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
    pub finish_rank: Option<String>,
    pub popularity: Option<String>,
    pub win_odds: Option<String>,
    pub finish_time: Option<String>,
    pub last_3f: Option<String>,
}

/// Repository for historical race data
pub struct RaceRepository {
    conn: Connection,
}

impl RaceRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        create_tables(&conn).context("Failed to create tables")?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Insert Operations ====================

    /// Insert a race (upsert)
    pub fn insert_race(&self, race: &RaceRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO races
            (year, month_day, course_code, race_number, distance, track_code,
             weather_code, turf_condition_code, dirt_condition_code)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                race.race_id.year,
                race.race_id.month_day,
                race.race_id.course_code,
                race.race_id.race_number,
                race.distance,
                race.track_code,
                race.weather_code,
                race.turf_condition_code,
                race.dirt_condition_code,
            ],
        )?;
        Ok(())
    }

    /// Insert a result row (upsert)
    pub fn insert_result(&self, entry: &StoredResult) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO race_results
            (year, month_day, course_code, race_number, horse_id, horse_name, bracket,
             horse_number, age, sex_code, body_weight, weight_sign, weight_diff,
             weight_carried, jockey_code, jockey_name, trainer_code, trainer_name,
             finish_rank, popularity, win_odds, finish_time, last_3f)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            "#,
            params![
                entry.race_id.year,
                entry.race_id.month_day,
                entry.race_id.course_code,
                entry.race_id.race_number,
                entry.horse_id,
                entry.horse_name,
                entry.bracket,
                entry.horse_number,
                entry.age,
                entry.sex_code,
                entry.body_weight,
                entry.weight_sign,
                entry.weight_diff,
                entry.weight_carried,
                entry.jockey_code,
                entry.jockey_name,
                entry.trainer_code,
                entry.trainer_name,
                entry.finish_rank,
                entry.popularity,
                entry.win_odds,
                entry.finish_time,
                entry.last_3f,
            ],
        )?;
        Ok(())
    }

    /// Insert a horse profile (upsert)
    pub fn insert_horse(&self, horse: &HorseProfile) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO horses
            (horse_id, horse_name, birth_date, sire_id, sire_name, dam_id, dam_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                horse.horse_id,
                horse.horse_name,
                horse.birth_date.map(|d| d.format("%Y%m%d").to_string()),
                horse.sire_id,
                horse.sire_name,
                horse.dam_id,
                horse.dam_name,
            ],
        )?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Get race count
    pub fn race_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM races", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get result row count
    pub fn result_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM race_results", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Build a WHERE clause over races aliased `r`. `horse_condition` is the
/// SQL used for the horse id filter, since it depends on the joined tables.
fn where_clause(filter: &RaceFilter, horse_condition: &str) -> (String, Vec<String>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(year) = filter.year {
        conditions.push("r.year = ?".to_string());
        values.push(format!("{:04}", year));
    }

    if let Some((start, end)) = filter.year_range {
        conditions.push("r.year BETWEEN ? AND ?".to_string());
        values.push(format!("{:04}", start));
        values.push(format!("{:04}", end));
    }

    if let Some(ref start) = filter.start_month_day {
        conditions.push("r.month_day >= ?".to_string());
        values.push(start.clone());
    }

    if let Some(ref end) = filter.end_month_day {
        conditions.push("r.month_day <= ?".to_string());
        values.push(end.clone());
    }

    if let Some(ref race_id) = filter.race_id {
        conditions.push(
            "r.year = ? AND r.month_day = ? AND r.course_code = ? AND r.race_number = ?"
                .to_string(),
        );
        values.push(race_id.year.clone());
        values.push(race_id.month_day.clone());
        values.push(race_id.course_code.clone());
        values.push(race_id.race_number.clone());
    }

    if let Some(ref horse_id) = filter.horse_id {
        conditions.push(horse_condition.to_string());
        values.push(horse_id.clone());
    }

    if let Some(before) = filter.before {
        conditions.push("(r.year || r.month_day) < ?".to_string());
        values.push(before.format("%Y%m%d").to_string());
    }

    let clause = if conditions.is_empty() {
        "1=1".to_string()
    } else {
        conditions.join(" AND ")
    };

    (clause, values)
}

/// Scale a tenths value ("0123" → "12.3"). Non-numeric values pass through
/// unchanged so cleaning can mark them missing.
fn scale_tenths(value: Option<String>) -> Option<String> {
    let value = value?;
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(format!("{}", v / 10.0)),
        _ => Some(value),
    }
}

fn race_id_from_row(row: &Row<'_>) -> rusqlite::Result<RaceId> {
    Ok(RaceId {
        year: row.get(0)?,
        month_day: row.get(1)?,
        course_code: row.get(2)?,
        race_number: row.get(3)?,
    })
}

impl RaceSource for RaceRepository {
    fn race_info(&self, filter: &RaceFilter) -> Result<Vec<RaceRecord>> {
        let (clause, values) = where_clause(
            filter,
            "EXISTS (SELECT 1 FROM race_results s WHERE s.year = r.year
                AND s.month_day = r.month_day AND s.course_code = r.course_code
                AND s.race_number = r.race_number AND s.horse_id = ?)",
        );

        let sql = format!(
            r#"
            SELECT r.year, r.month_day, r.course_code, r.race_number, r.distance,
                   r.track_code, r.weather_code, r.turf_condition_code, r.dirt_condition_code
            FROM races r
            WHERE {}
            ORDER BY r.year, r.month_day, r.course_code, r.race_number
            "#,
            clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let races = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(RaceRecord {
                    race_id: race_id_from_row(row)?,
                    distance: row.get(4)?,
                    track_code: row.get(5)?,
                    weather_code: row.get(6)?,
                    turf_condition_code: row.get(7)?,
                    dirt_condition_code: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to query races")?;

        Ok(races)
    }

    fn race_results(&self, filter: &RaceFilter) -> Result<Vec<RawResultRow>> {
        let (clause, values) = where_clause(filter, "s.horse_id = ?");

        let sql = format!(
            r#"
            SELECT r.year, r.month_day, r.course_code, r.race_number,
                   r.distance, r.track_code, r.weather_code,
                   CASE WHEN substr(r.track_code, 1, 1) = '1' THEN r.turf_condition_code
                        ELSE r.dirt_condition_code END,
                   s.horse_id, TRIM(s.horse_name), s.bracket, s.horse_number, s.age,
                   s.sex_code, s.body_weight, s.weight_sign, s.weight_diff, s.weight_carried,
                   s.jockey_code, TRIM(s.jockey_name), s.trainer_code, TRIM(s.trainer_name),
                   s.finish_rank, s.popularity, s.win_odds, s.finish_time, s.last_3f
            FROM race_results s
            JOIN races r ON r.year = s.year
                        AND r.month_day = s.month_day
                        AND r.course_code = s.course_code
                        AND r.race_number = s.race_number
            WHERE {}
            ORDER BY r.year, r.month_day, r.course_code, r.race_number, s.horse_number, s.horse_id
            "#,
            clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let horse_name: Option<String> = row.get(9)?;
                Ok(RawResultRow {
                    race_id: race_id_from_row(row)?,
                    distance: row.get(4)?,
                    track_code: row.get(5)?,
                    weather_code: row.get(6)?,
                    condition_code: row.get(7)?,
                    horse_id: row.get(8)?,
                    horse_name: horse_name.unwrap_or_default(),
                    bracket: row.get(10)?,
                    horse_number: row.get(11)?,
                    age: row.get(12)?,
                    sex_code: row.get(13)?,
                    body_weight: row.get(14)?,
                    weight_sign: row.get(15)?,
                    weight_diff: row.get(16)?,
                    weight_carried: row.get(17)?,
                    jockey_code: row.get(18)?,
                    jockey_name: row.get(19)?,
                    trainer_code: row.get(20)?,
                    trainer_name: row.get(21)?,
                    rank: row.get(22)?,
                    popularity: row.get(23)?,
                    odds: scale_tenths(row.get(24)?),
                    time: row.get(25)?,
                    last_3f: scale_tenths(row.get(26)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to query race results")?;

        debug!("Fetched {} result rows for {:?}", rows.len(), filter);
        Ok(rows)
    }

    fn horse_profiles(
        &self,
        horse_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<HorseProfile>> {
        let mut sql = String::from(
            r#"
            SELECT horse_id, TRIM(horse_name), birth_date, sire_id, TRIM(sire_name),
                   dam_id, TRIM(dam_name)
            FROM horses
            "#,
        );
        let mut values: Vec<String> = Vec::new();

        if let Some(id) = horse_id {
            sql.push_str(" WHERE horse_id = ?");
            values.push(id.to_string());
        }
        sql.push_str(" ORDER BY horse_id");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let horses = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let horse_name: Option<String> = row.get(1)?;
                let birth: Option<String> = row.get(2)?;
                Ok(HorseProfile {
                    horse_id: row.get(0)?,
                    horse_name: horse_name.unwrap_or_default(),
                    birth_date: birth
                        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y%m%d").ok()),
                    sire_id: row.get(3)?,
                    sire_name: row.get(4)?,
                    dam_id: row.get(5)?,
                    dam_name: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to query horses")?;

        Ok(horses)
    }

    fn last_n_runs(
        &self,
        horse_id: &str,
        n: usize,
        before: Option<NaiveDate>,
    ) -> Result<Vec<RaceId>> {
        // Race-id order is date order: year and month-day lead the key
        let cutoff = before
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| "99999999".to_string());

        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT year, month_day, course_code, race_number
            FROM race_results
            WHERE horse_id = ?1 AND (year || month_day) < ?2
            ORDER BY year DESC, month_day DESC, course_code DESC, race_number DESC
            LIMIT ?3
            "#,
        )?;

        let ids = stmt
            .query_map(params![horse_id, cutoff, n as i64], race_id_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to query last runs for horse {}", horse_id))?;

        Ok(ids)
    }

    fn race_ids(&self, start_year: u16, end_year: u16, limit: usize) -> Result<Vec<RaceId>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT year, month_day, course_code, race_number
            FROM races
            WHERE year BETWEEN ?1 AND ?2
            ORDER BY year, month_day, course_code, race_number
            LIMIT ?3
            "#,
        )?;

        let ids = stmt
            .query_map(
                params![
                    format!("{:04}", start_year),
                    format!("{:04}", end_year),
                    limit as i64
                ],
                race_id_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to query race ids")?;

        Ok(ids)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn seeded_repo() -> RaceRepository {
        let repo = RaceRepository::in_memory().unwrap();
        repo.insert_race(&race("202201050501", "1600", "11", "1")).unwrap();
        repo.insert_race(&race("202202060601", "1200", "23", "3")).unwrap();
        repo.insert_race(&race("202301080801", "2400", "11", "2")).unwrap();

        repo.insert_result(&result("202201050501", "H1", "01", "1", "0035", "345")).unwrap();
        repo.insert_result(&result("202201050501", "H2", "02", "2", "0052", "352")).unwrap();
        repo.insert_result(&result("202202060601", "H1", "03", "2", "0040", "371")).unwrap();
        repo.insert_result(&result("202301080801", "H1", "99", "5", "----", "")).unwrap();
        repo
    }

    #[test]
    fn test_insert_and_count() {
        let repo = seeded_repo();
        assert_eq!(repo.race_count().unwrap(), 3);
        assert_eq!(repo.result_count().unwrap(), 4);
    }

    #[test]
    fn test_upsert_race() {
        let repo = seeded_repo();
        repo.insert_race(&race("202201050501", "1800", "11", "1")).unwrap();
        assert_eq!(repo.race_count().unwrap(), 3);

        let races = repo
            .race_info(&RaceFilter::race(&RaceId::parse("202201050501").unwrap()))
            .unwrap();
        assert_eq!(races[0].distance.as_deref(), Some("1800"));
    }

    #[test]
    fn test_results_by_race_scale_tenths() {
        let repo = seeded_repo();
        let id = RaceId::parse("202201050501").unwrap();
        let rows = repo.race_results(&RaceFilter::race(&id)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].horse_id, "H1");
        assert_eq!(rows[0].odds.as_deref(), Some("3.5"));
        assert_eq!(rows[0].last_3f.as_deref(), Some("34.5"));
        assert_eq!(rows[0].condition_code.as_deref(), Some("1"));
    }

    #[test]
    fn test_non_numeric_odds_pass_through() {
        let repo = seeded_repo();
        let id = RaceId::parse("202301080801").unwrap();
        let rows = repo.race_results(&RaceFilter::race(&id)).unwrap();

        assert_eq!(rows[0].odds.as_deref(), Some("----"));
        assert_eq!(rows[0].last_3f.as_deref(), Some(""));
    }

    #[test]
    fn test_results_by_horse_and_before() {
        let repo = seeded_repo();
        let all = repo.race_results(&RaceFilter::horse("H1")).unwrap();
        assert_eq!(all.len(), 3);

        let before = RaceFilter::horse("H1").before(NaiveDate::from_ymd_opt(2022, 2, 1).unwrap());
        let earlier = repo.race_results(&before).unwrap();
        assert_eq!(earlier.len(), 1);
        assert_eq!(earlier[0].race_id.to_string(), "202201050501");
    }

    #[test]
    fn test_results_by_year_range() {
        let repo = seeded_repo();
        let rows = repo.race_results(&RaceFilter::years(2022, 2022)).unwrap();
        assert_eq!(rows.len(), 3);

        let rows = repo.race_results(&RaceFilter::years(2023, 2024)).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_race_info_by_year() {
        let repo = seeded_repo();
        let races = repo.race_info(&RaceFilter::year(2022)).unwrap();
        let mut ids: Vec<String> = races.iter().map(|r| r.race_id.to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["202201050501", "202202060601"]);

        assert!(repo.race_info(&RaceFilter::year(2021)).unwrap().is_empty());
    }

    #[test]
    fn test_month_day_range_is_inclusive() {
        let repo = seeded_repo();
        let ids = |filter: RaceFilter| {
            let mut ids: Vec<String> = repo
                .race_info(&filter)
                .unwrap()
                .iter()
                .map(|r| r.race_id.to_string())
                .collect();
            ids.sort();
            ids
        };

        // Both bounds land exactly on a race date
        assert_eq!(
            ids(RaceFilter::default().month_days("0105", "0206")),
            vec!["202201050501", "202202060601", "202301080801"]
        );
        assert_eq!(
            ids(RaceFilter::default().month_days("0106", "0206")),
            vec!["202202060601", "202301080801"]
        );
        assert_eq!(
            ids(RaceFilter::default().month_days("0105", "0107")),
            vec!["202201050501"]
        );
        assert_eq!(
            ids(RaceFilter::year(2022).month_days("0105", "0206")),
            vec!["202201050501", "202202060601"]
        );
    }

    #[test]
    fn test_results_by_month_day_range() {
        let repo = seeded_repo();
        let rows = repo
            .race_results(&RaceFilter::year(2022).month_days("0201", "0228"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].race_id.to_string(), "202202060601");
    }

    #[test]
    fn test_race_info_by_horse() {
        let repo = seeded_repo();
        let races = repo.race_info(&RaceFilter::horse("H2")).unwrap();
        assert_eq!(races.len(), 1);
        assert_eq!(races[0].race_id.to_string(), "202201050501");
    }

    #[test]
    fn test_last_n_runs() {
        let repo = seeded_repo();
        let ids = repo.last_n_runs("H1", 2, None).unwrap();
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["202301080801", "202202060601"]);

        let before = NaiveDate::from_ymd_opt(2023, 1, 8);
        let ids = repo.last_n_runs("H1", 5, before).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].to_string(), "202202060601");

        assert!(repo.last_n_runs("H1", 0, None).unwrap().is_empty());
        assert!(repo.last_n_runs("NONE", 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_race_ids_limit() {
        let repo = seeded_repo();
        let ids = repo.race_ids(2022, 2023, 10).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].to_string(), "202201050501");

        let ids = repo.race_ids(2022, 2023, 2).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_horse_profiles() {
        let repo = seeded_repo();
        repo.insert_horse(&horse("H1", "ディープインパクト")).unwrap();
        repo.insert_horse(&horse("H2", "キングカメハメハ")).unwrap();

        let all = repo.horse_profiles(None, None).unwrap();
        assert_eq!(all.len(), 2);

        let one = repo.horse_profiles(Some("H2"), None).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].sire_name.as_deref(), Some("キングカメハメハ"));
        assert_eq!(one[0].birth_date, NaiveDate::from_ymd_opt(2018, 4, 1));

        let limited = repo.horse_profiles(None, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
