use crate::output::CycleReport;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCycle {
    pub id: i64,
    pub cycle: u64,
    pub recorded_at: i64,
    pub readings: Vec<RecordedReading>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReading {
    pub emitter: String,
    pub estimate: f64,
    pub observed: bool,
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmitterStats {
    pub emitter: String,
    pub cycles: usize,
    pub observed: usize,
    pub mean_distance_m: Option<f64>,
    pub min_distance_m: Option<f64>,
    pub max_distance_m: Option<f64>,
}

impl EmitterStats {
    pub fn observed_ratio(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        self.observed as f64 / self.cycles as f64
    }
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;

        let db = Database { conn };
        db.initialize()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cycle INTEGER NOT NULL,
                recorded_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cycle_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                emitter TEXT NOT NULL,
                estimate REAL NOT NULL,
                observed INTEGER NOT NULL,
                distance_m REAL,
                FOREIGN KEY (cycle_id) REFERENCES cycles(id)
            );

            CREATE INDEX IF NOT EXISTS idx_cycles_recorded_at ON cycles(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_readings_cycle_id ON readings(cycle_id);
            CREATE INDEX IF NOT EXISTS idx_readings_emitter ON readings(emitter);
            "#,
        )?;

        Ok(())
    }

    pub fn insert_cycle(&mut self, report: &CycleReport) -> Result<i64> {
        self.insert_cycle_at(report, Utc::now().timestamp())
    }

    pub fn insert_cycle_at(&mut self, report: &CycleReport, recorded_at: i64) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO cycles (cycle, recorded_at) VALUES (?, ?)",
            params![report.cycle as i64, recorded_at],
        )?;
        let cycle_id = tx.last_insert_rowid();

        for (position, entry) in report.entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO readings (cycle_id, position, emitter, estimate, observed, distance_m)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    cycle_id,
                    position as i64,
                    entry.id.as_str(),
                    entry.estimate,
                    entry.observed,
                    entry.distance,
                ],
            )?;
        }

        tx.commit()?;
        Ok(cycle_id)
    }

    /// Most recent cycles first
    pub fn recent_cycles(&self, limit: usize) -> Result<Vec<RecordedCycle>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cycle, recorded_at FROM cycles ORDER BY id DESC LIMIT ?"
        )?;

        let mut cycles = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RecordedCycle {
                    id: row.get(0)?,
                    cycle: row.get::<_, i64>(1)? as u64,
                    recorded_at: row.get(2)?,
                    readings: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for cycle in &mut cycles {
            cycle.readings = self.readings_for_cycle(cycle.id)?;
        }

        Ok(cycles)
    }

    pub fn readings_for_cycle(&self, cycle_id: i64) -> Result<Vec<RecordedReading>> {
        let mut stmt = self.conn.prepare(
            "SELECT emitter, estimate, observed, distance_m
             FROM readings WHERE cycle_id = ? ORDER BY position"
        )?;

        let readings = stmt
            .query_map(params![cycle_id], |row| {
                Ok(RecordedReading {
                    emitter: row.get(0)?,
                    estimate: row.get(1)?,
                    observed: row.get(2)?,
                    distance_m: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    pub fn emitter_stats(&self) -> Result<Vec<EmitterStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT emitter, COUNT(*), SUM(observed), AVG(distance_m), MIN(distance_m), MAX(distance_m)
             FROM readings GROUP BY emitter ORDER BY MIN(position), emitter"
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(EmitterStats {
                    emitter: row.get(0)?,
                    cycles: row.get::<_, i64>(1)? as usize,
                    observed: row.get::<_, i64>(2)? as usize,
                    mean_distance_m: row.get(3)?,
                    min_distance_m: row.get(4)?,
                    max_distance_m: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    pub fn count_cycles(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cycles",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
