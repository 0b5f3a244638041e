use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::analysis::rating_engine::build_leaderboards;
use crate::config::RankingConfig;
use crate::error::{Error, Result};
use crate::models::{RankingRecord, RankingRun};

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ranking_runs (
                id INTEGER PRIMARY KEY,
                run_date TEXT NOT NULL,
                config_json TEXT NOT NULL,
                global_mean_rating REAL
            );

            CREATE TABLE IF NOT EXISTS ranking_records (
                id INTEGER PRIMARY KEY,
                run_id INTEGER NOT NULL REFERENCES ranking_runs(id),
                position INTEGER NOT NULL,
                entity_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                raw_rating REAL,
                weighted_rating REAL,
                bayesian_rating REAL,
                raw_difficulty REAL,
                weighted_difficulty REAL,
                bayesian_difficulty REAL,
                hard_pct REAL,
                review_count INTEGER NOT NULL,
                text_count INTEGER NOT NULL,
                UNIQUE(run_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_ranking_records_run_id ON ranking_records(run_id);
            "#,
        )?;

        Ok(())
    }

    /// Stores a complete run. Earlier runs are kept but superseded; records
    /// are never updated in place.
    pub fn save_run(&self, run: &RankingRun) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let config_json = serde_json::to_string(&run.config)?;
        tx.execute(
            "INSERT INTO ranking_runs (run_date, config_json, global_mean_rating) VALUES (?1, ?2, ?3)",
            params![run.run_date.to_rfc3339(), config_json, run.global_mean_rating],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO ranking_records (
                    run_id, position, entity_id, name,
                    raw_rating, weighted_rating, bayesian_rating,
                    raw_difficulty, weighted_difficulty, bayesian_difficulty,
                    hard_pct, review_count, text_count
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )?;

            for (position, record) in run.records.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    position,
                    record.id,
                    record.name,
                    record.raw_rating,
                    record.weighted_rating,
                    record.bayesian_rating,
                    record.raw_difficulty,
                    record.weighted_difficulty,
                    record.bayesian_difficulty,
                    record.hard_pct,
                    record.review_count,
                    record.text_count,
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!("Saved ranking run {} ({} records)", run_id, run.records.len());
        Ok(run_id)
    }

    /// The most recent run, with leaderboards rebuilt from its stored config.
    pub fn latest_run(&self) -> Result<Option<RankingRun>> {
        let result = self.conn.query_row(
            "SELECT id, run_date, config_json, global_mean_rating FROM ranking_runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            },
        );

        match result {
            Ok((run_id, run_date, config_json, global_mean_rating)) => {
                let run_date = DateTime::parse_from_rfc3339(&run_date)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| Error::ParseError(format!("stored run date {:?}: {}", run_date, e)))?;
                let config: RankingConfig = serde_json::from_str(&config_json)?;
                let records = self.get_records(run_id)?;
                let leaderboards = build_leaderboards(&records, &config);

                Ok(Some(RankingRun {
                    run_date,
                    config,
                    global_mean_rating,
                    records,
                    leaderboards,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_records(&self, run_id: i64) -> Result<Vec<RankingRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT entity_id, name,
                   raw_rating, weighted_rating, bayesian_rating,
                   raw_difficulty, weighted_difficulty, bayesian_difficulty,
                   hard_pct, review_count, text_count
            FROM ranking_records
            WHERE run_id = ?1
            ORDER BY position
            "#,
        )?;

        let records = stmt.query_map(params![run_id], |row| {
            Ok(RankingRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                raw_rating: row.get(2)?,
                weighted_rating: row.get(3)?,
                bayesian_rating: row.get(4)?,
                raw_difficulty: row.get(5)?,
                weighted_difficulty: row.get(6)?,
                bayesian_difficulty: row.get(7)?,
                hard_pct: row.get(8)?,
                review_count: row.get(9)?,
                text_count: row.get(10)?,
            })
        })?;

        records.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_runs(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, run_date FROM ranking_runs ORDER BY id DESC")?;

        let runs = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        runs.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Leaderboards;
    use chrono::TimeZone;

    fn record(id: u64, bayesian_rating: Option<f64>) -> RankingRecord {
        RankingRecord {
            name: format!("Course {}", id),
            id,
            raw_rating: bayesian_rating,
            weighted_rating: bayesian_rating,
            bayesian_rating,
            raw_difficulty: None,
            weighted_difficulty: Some(1.25),
            bayesian_difficulty: Some(1.1),
            hard_pct: Some(0.0),
            review_count: 12,
            text_count: 8,
        }
    }

    fn run(records: Vec<RankingRecord>) -> RankingRun {
        let config = RankingConfig::default();
        let leaderboards = build_leaderboards(&records, &config);
        RankingRun {
            run_date: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            config,
            global_mean_rating: Some(3.9),
            records,
            leaderboards,
        }
    }

    #[test]
    fn test_empty_database_has_no_run() {
        let storage = Storage::in_memory().unwrap();
        assert!(storage.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_save_and_reload_run() {
        let storage = Storage::in_memory().unwrap();
        let saved = run(vec![record(1, Some(4.2)), record(2, None), record(3, Some(3.1))]);

        storage.save_run(&saved).unwrap();
        let loaded = storage.latest_run().unwrap().unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.records[1].bayesian_rating, None);
        assert_eq!(loaded.records[0].hard_pct, Some(0.0));
    }

    #[test]
    fn test_newer_run_supersedes_older() {
        let storage = Storage::in_memory().unwrap();
        storage.save_run(&run(vec![record(1, Some(4.0))])).unwrap();
        let newer = run(vec![record(2, Some(3.0)), record(3, Some(2.0))]);
        storage.save_run(&newer).unwrap();

        let loaded = storage.latest_run().unwrap().unwrap();
        let ids: Vec<u64> = loaded.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(storage.list_runs().unwrap().len(), 2);
        assert_ne!(loaded.leaderboards, Leaderboards::default());
    }
}
