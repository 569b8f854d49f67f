//! Storage layer for dwell.
//!
//! Provides persistence for tracking settings and aggregated dwell time using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The daemon owns its `Database` from a single thread; offline commands open
//! their own.
//!
//! # Schema
//!
//! ## Day Keys
//!
//! Days are stored as TEXT in ISO 8601 calendar format (e.g., `2025-01-29`),
//! derived from local wall-clock time at the moment of commit. Lexicographic
//! ordering matches chronological ordering, so range reads and pruning are
//! plain string comparisons.
//!
//! ## Settings
//!
//! The `settings` table holds one row per [`Settings`] field, keyed by the
//! field's camelCase name with a JSON value. Missing rows fall back to the
//! field's default and are written back on load.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Days, Local, NaiveDate, Timelike};
use dwell_core::{
    CommitReceipt, DayStats, Ledger, LedgerError, RangeStats, ResourceKey, Settings,
    ValidationError,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored settings value could not be encoded or decoded.
    #[error("invalid settings value: {0}")]
    SettingsJson(#[from] serde_json::Error),
    /// Stored settings decoded but are out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ValidationError),
    /// A stored day key is not a calendar date.
    #[error("invalid day key in {table}: {value}")]
    InvalidDay {
        table: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored resource key is empty.
    #[error("invalid resource key in {table}: {source}")]
    InvalidResource {
        table: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Overview of the stored statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSummary {
    pub days: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub total_seconds: u64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Seconds per resource per local calendar day
            CREATE TABLE IF NOT EXISTS daily_totals (
                day TEXT NOT NULL,
                resource TEXT NOT NULL,
                seconds INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (day, resource)
            );

            -- Seconds per resource per hour of a local calendar day
            CREATE TABLE IF NOT EXISTS hourly_totals (
                day TEXT NOT NULL,
                resource TEXT NOT NULL,
                hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
                seconds INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (day, resource, hour)
            );

            CREATE INDEX IF NOT EXISTS idx_hourly_totals_day ON hourly_totals(day);
            ",
        )?;
        Ok(())
    }

    /// Loads tracking settings.
    ///
    /// Fields without a stored value take their defaults, and those defaults
    /// are persisted so the stored settings are always complete.
    pub fn load_settings(&mut self) -> Result<Settings, DbError> {
        let stored = self.settings_values()?;
        let settings: Settings = serde_json::from_value(Value::Object(stored.clone()))?;
        settings.validate()?;

        let Value::Object(complete) = serde_json::to_value(&settings)? else {
            return Ok(settings);
        };
        if complete.keys().any(|key| !stored.contains_key(key)) {
            tracing::debug!("writing default settings");
            self.save_settings(&settings)?;
        }
        Ok(settings)
    }

    /// Persists every settings field.
    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), DbError> {
        let Value::Object(fields) = serde_json::to_value(settings)? else {
            return Ok(());
        };
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO settings (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )?;
            for (key, value) in &fields {
                stmt.execute(params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn settings_values(&self) -> Result<serde_json::Map<String, Value>, DbError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;
        let mut values = serde_json::Map::new();
        for row in rows {
            let (key, value) = row?;
            values.insert(key, serde_json::from_str(&value)?);
        }
        Ok(values)
    }

    /// Adds `seconds` to the daily and hourly totals for the local day and hour of `at`.
    ///
    /// Both increments happen in one transaction.
    pub fn record(
        &mut self,
        resource: &ResourceKey,
        seconds: u64,
        at: DateTime<Local>,
    ) -> Result<CommitReceipt, DbError> {
        let day = at.date_naive();
        let hour = at.hour();
        let day_key = format_day(day);
        let increment = to_sql_seconds(seconds);

        let tx = self.conn.transaction()?;
        let previous: Option<i64> = tx
            .query_row(
                "SELECT seconds FROM daily_totals WHERE day = ?1 AND resource = ?2",
                params![day_key, resource.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute(
            "
            INSERT INTO daily_totals (day, resource, seconds) VALUES (?1, ?2, ?3)
            ON CONFLICT(day, resource) DO UPDATE SET seconds = seconds + excluded.seconds
            ",
            params![day_key, resource.as_str(), increment],
        )?;
        tx.execute(
            "
            INSERT INTO hourly_totals (day, resource, hour, seconds) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(day, resource, hour) DO UPDATE SET seconds = seconds + excluded.seconds
            ",
            params![day_key, resource.as_str(), hour, increment],
        )?;
        tx.commit()?;

        let previous_total = previous.map_or(0, from_sql_seconds);
        Ok(CommitReceipt {
            day,
            hour,
            previous_total,
            new_total: previous_total.saturating_add(seconds),
        })
    }

    /// Statistics for a single day; empty if nothing was recorded.
    pub fn stats_for_day(&self, day: NaiveDate) -> Result<DayStats, DbError> {
        let mut range = self.read_range(day, day)?;
        Ok(range.remove(&day).unwrap_or_default())
    }

    /// Statistics for every day in `start..=end` that has data.
    pub fn read_range(&self, start: NaiveDate, end: NaiveDate) -> Result<RangeStats, DbError> {
        let mut stats = RangeStats::new();
        if end < start {
            return Ok(stats);
        }
        let (start, end) = (format_day(start), format_day(end));

        let mut stmt = self.conn.prepare(
            "
            SELECT day, resource, seconds
            FROM daily_totals
            WHERE day >= ?1 AND day <= ?2
            ORDER BY day ASC, resource ASC
            ",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            let day: String = row.get(0)?;
            let resource: String = row.get(1)?;
            let seconds: i64 = row.get(2)?;
            Ok((day, resource, seconds))
        })?;
        for row in rows {
            let (day, resource, seconds) = row?;
            let day = parse_day_key("daily_totals", day)?;
            let resource = parse_resource("daily_totals", resource)?;
            stats
                .entry(day)
                .or_default()
                .daily
                .insert(resource, from_sql_seconds(seconds));
        }

        let mut stmt = self.conn.prepare(
            "
            SELECT day, resource, hour, seconds
            FROM hourly_totals
            WHERE day >= ?1 AND day <= ?2
            ORDER BY day ASC, resource ASC, hour ASC
            ",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            let day: String = row.get(0)?;
            let resource: String = row.get(1)?;
            let hour: u32 = row.get(2)?;
            let seconds: i64 = row.get(3)?;
            Ok((day, resource, hour, seconds))
        })?;
        for row in rows {
            let (day, resource, hour, seconds) = row?;
            let day = parse_day_key("hourly_totals", day)?;
            let resource = parse_resource("hourly_totals", resource)?;
            stats
                .entry(day)
                .or_default()
                .hourly
                .entry(resource)
                .or_insert_with(BTreeMap::new)
                .insert(hour, from_sql_seconds(seconds));
        }
        Ok(stats)
    }

    /// Deletes every day strictly older than `today - retention_days`.
    ///
    /// Returns the number of distinct days removed.
    pub fn prune(&mut self, retention_days: u32, today: NaiveDate) -> Result<usize, DbError> {
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return Ok(0);
        };
        let cutoff = format_day(cutoff);

        let tx = self.conn.transaction()?;
        let removed: i64 = tx.query_row(
            "
            SELECT COUNT(DISTINCT day) FROM (
                SELECT day FROM daily_totals WHERE day < ?1
                UNION SELECT day FROM hourly_totals WHERE day < ?1
            )
            ",
            params![cutoff],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM daily_totals WHERE day < ?1", params![cutoff])?;
        tx.execute("DELETE FROM hourly_totals WHERE day < ?1", params![cutoff])?;
        tx.commit()?;

        let removed = usize::try_from(removed).unwrap_or(0);
        tracing::info!(retention_days, %cutoff, removed, "pruned statistics");
        Ok(removed)
    }

    /// Deletes all statistics. Settings are kept.
    pub fn clear_all(&mut self) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM daily_totals", [])?;
        tx.execute("DELETE FROM hourly_totals", [])?;
        tx.commit()?;
        tracing::info!("cleared all statistics");
        Ok(())
    }

    /// Counts stored days and their combined total.
    pub fn summary(&self) -> Result<StorageSummary, DbError> {
        let (days, first, last, total): (i64, Option<String>, Option<String>, Option<i64>) =
            self.conn.query_row(
                "SELECT COUNT(DISTINCT day), MIN(day), MAX(day), SUM(seconds) FROM daily_totals",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(StorageSummary {
            days: usize::try_from(days).unwrap_or(0),
            first_day: first
                .map(|day| parse_day_key("daily_totals", day))
                .transpose()?,
            last_day: last
                .map(|day| parse_day_key("daily_totals", day))
                .transpose()?,
            total_seconds: total.map_or(0, from_sql_seconds),
        })
    }
}

impl Ledger for Database {
    fn commit(
        &mut self,
        resource: &ResourceKey,
        seconds: u64,
        at: DateTime<Local>,
    ) -> Result<CommitReceipt, LedgerError> {
        self.record(resource, seconds, at)
            .map_err(|err| LedgerError(Box::new(err)))
    }
}

fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn parse_day_key(table: &'static str, value: String) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|source| DbError::InvalidDay {
        table,
        value,
        source,
    })
}

fn parse_resource(table: &'static str, value: String) -> Result<ResourceKey, DbError> {
    ResourceKey::new(value).map_err(|source| DbError::InvalidResource { table, source })
}

fn to_sql_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

fn from_sql_seconds(seconds: i64) -> u64 {
    u64::try_from(seconds).unwrap_or(0)
}
