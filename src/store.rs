//! ==============================================================================
//! store.rs - telemetry store boundary and sqlite implementation
//! ==============================================================================
//!
//! purpose:
//!     durable, append-only storage of timestamped readings.
//!     the bridge only ever inserts; nothing here is read back at runtime.
//!
//! design:
//!     - TelemetryStore is a blocking trait (like the hardware providers),
//!       only the persistence worker thread calls it.
//!     - SqliteStore keeps one table per sensor, matching the dashboard's
//!       historical schema: temperature_readings, ph_readings, turbidity_readings.
//!
//! ==============================================================================

use crate::domain::{SensorKind, SensorReading};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

pub trait TelemetryStore: Send + Sync {
    fn insert(&self, reading: &SensorReading) -> Result<()>;
}

const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS temperature_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    value REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS ph_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    value REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS turbidity_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    value REAL NOT NULL
);
";

fn table_for(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Temperature => "temperature_readings",
        SensorKind::Ph => "ph_readings",
        SensorKind::Turbidity => "turbidity_readings",
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// open (or create) the database file. `:memory:` gives a throwaway store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database {}", path.display()))?;

        // wal is not available for in-memory databases, just note it
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::debug!(error = %err, "could not enable WAL mode");
        }

        ensure_schema(&conn).context("failed to prepare database schema")?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// number of stored rows for one sensor
    pub fn count(&self, kind: SensorKind) -> Result<u64> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table_for(kind));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        u64::try_from(count).context("negative row count")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection mutex poisoned"))
    }
}

impl TelemetryStore for SqliteStore {
    fn insert(&self, reading: &SensorReading) -> Result<()> {
        let conn = self.lock()?;
        let sql = format!(
            "INSERT INTO {} (date, time, value) VALUES (?1, ?2, ?3)",
            table_for(reading.kind)
        );
        conn.execute(
            &sql,
            params![reading.date_string(), reading.time_string(), reading.value],
        )
        .with_context(|| format!("failed to insert {} reading", reading.kind))?;
        Ok(())
    }
}

/// create the tables on a fresh file. `user_version` marks a file that
/// already has them; a file from a newer build is refused.
fn ensure_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    match version {
        SCHEMA_VERSION => Ok(()),
        0 => conn
            .execute_batch(&format!(
                "BEGIN; {SCHEMA_V1} PRAGMA user_version = {SCHEMA_VERSION}; COMMIT;"
            ))
            .context("failed to create reading tables"),
        newer => bail!("database version ({newer}) is newer than supported schema ({SCHEMA_VERSION})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn reading(kind: SensorKind, value: f64) -> SensorReading {
        SensorReading {
            kind,
            value,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_goes_to_kind_table() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.insert(&reading(SensorKind::Temperature, 25.0)).unwrap();
        store.insert(&reading(SensorKind::Ph, 7.0)).unwrap();
        store.insert(&reading(SensorKind::Ph, 7.1)).unwrap();

        assert_eq!(store.count(SensorKind::Temperature).unwrap(), 1);
        assert_eq!(store.count(SensorKind::Ph).unwrap(), 2);
        assert_eq!(store.count(SensorKind::Turbidity).unwrap(), 0);
    }

    #[test]
    fn test_row_uses_formatted_date_and_time() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.insert(&reading(SensorKind::Turbidity, 4.5)).unwrap();

        let conn = store.lock().unwrap();
        let (date, time, value): (String, String, f64) = conn
            .query_row(
                "SELECT date, time, value FROM turbidity_readings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(date, "2024-06-01");
        assert_eq!(time, "12:30:00");
        assert_eq!(value, 4.5);
    }

    #[test]
    fn test_schema_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = std::env::temp_dir().join(format!("aquafeed-store-{}", std::process::id()));
        let path = dir.join("telemetry.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&reading(SensorKind::Ph, 6.9)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count(SensorKind::Ph).unwrap(), 1);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(ensure_schema(&conn).is_err());
    }
}
