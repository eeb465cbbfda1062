// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Database module - sensor history store

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::detection::DistanceSample;
use crate::sensors::{EventValue, SensorEvent};

/// History collaborator used by the controller
///
/// Writes are best effort; a failing query makes the controller fall back to
/// its in-memory history.
pub trait HistoryStore: Send + Sync {
    /// Persist one normalized event
    fn write(&self, event: &SensorEvent) -> Result<()>;

    /// Up to `n` most recent numeric values of a device received inside `lookback`, oldest first
    fn query_recent(
        &self,
        device_id: &str,
        n: usize,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<DistanceSample>>;
}

/// SQLite-backed history store
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;
        conn.execute_batch(r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        "#)?;

        let db = Self::with_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// In-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn: Mutex::new(conn) };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp_ms INTEGER NOT NULL,
                received_ms INTEGER NOT NULL,
                measurement TEXT NOT NULL,
                device_id TEXT NOT NULL,
                runs_on TEXT NOT NULL,
                simulated INTEGER NOT NULL,
                value REAL,
                value_text TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_points_device_received ON points(device_id, received_ms);
        "#)?;

        Ok(())
    }

    /// Delete points older than the retention period
    pub fn cleanup(&self, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let cutoff = now - Duration::days(retention_days as i64);

        let deleted = conn.execute(
            "DELETE FROM points WHERE received_ms < ?1",
            params![cutoff.timestamp_millis()],
        )?;

        info!("Cleaned up {} points older than {} days", deleted, retention_days);
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM points", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl HistoryStore for Database {
    fn write(&self, event: &SensorEvent) -> Result<()> {
        let conn = self.conn.lock();

        let text = match &event.value {
            EventValue::Raw(v) if event.value.as_number().is_none() => Some(v.to_string()),
            _ => None,
        };

        conn.execute(
            r#"INSERT INTO points
               (timestamp_ms, received_ms, measurement, device_id, runs_on, simulated, value, value_text)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                event.timestamp.timestamp_millis(),
                event.received_at.timestamp_millis(),
                event.measurement,
                event.device_id,
                event.origin_node,
                event.simulated,
                event.value.as_number(),
                text,
            ],
        )?;

        Ok(())
    }

    fn query_recent(
        &self,
        device_id: &str,
        n: usize,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<DistanceSample>> {
        let conn = self.conn.lock();
        let start = (now - lookback).timestamp_millis();

        let mut stmt = conn.prepare(
            "SELECT received_ms, value FROM points
             WHERE device_id = ?1 AND received_ms >= ?2 AND value IS NOT NULL
             ORDER BY received_ms DESC, id DESC LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![device_id, start, n as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut samples = Vec::new();
        for row in rows {
            let (ms, value) = row?;
            if let Some(timestamp) = Utc.timestamp_millis_opt(ms).single() {
                samples.push(DistanceSample { timestamp, distance_cm: value });
            }
        }
        samples.reverse();

        Ok(samples)
    }
}
