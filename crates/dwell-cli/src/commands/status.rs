//! Status command for showing settings and stored statistics.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use dwell_core::Settings;
use dwell_db::{Database, StorageSummary};

use crate::commands::report::format_duration;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, database_path: &Path) -> Result<()> {
    let settings = db.load_settings()?;
    let summary = db.summary()?;
    write_status(writer, &settings, &summary, database_path)
}

fn write_status<W: Write>(
    writer: &mut W,
    settings: &Settings,
    summary: &StorageSummary,
    database_path: &Path,
) -> Result<()> {
    writeln!(writer, "dwell status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(
        writer,
        "Tracking: {}",
        if settings.enabled { "enabled" } else { "disabled" }
    )?;
    writeln!(
        writer,
        "Reminder interval: {}",
        format_duration(settings.reminder_interval_seconds)
    )?;
    let threshold = format_duration(settings.inactivity_threshold_seconds);
    if settings.track_inactive_time {
        writeln!(writer, "Inactive time: counted")?;
    } else {
        writeln!(writer, "Inactive time: paused after {threshold} idle")?;
    }
    writeln!(
        writer,
        "Daily limits: {} ({} configured)",
        if settings.time_limit_enabled { "on" } else { "off" },
        settings.daily_limit_minutes.len()
    )?;
    for (resource, minutes) in &settings.daily_limit_minutes {
        writeln!(
            writer,
            "- {resource}: {}",
            format_duration(u64::from(*minutes) * 60)
        )?;
    }
    writeln!(writer, "Retention: {} days", settings.retention_days)?;

    match (summary.first_day, summary.last_day) {
        (Some(first), Some(last)) => writeln!(
            writer,
            "Stored: {} day{} ({first} to {last}), {} total",
            summary.days,
            if summary.days == 1 { "" } else { "s" },
            format_duration(summary.total_seconds)
        )?,
        _ => writeln!(writer, "Stored: no statistics recorded.")?,
    }

    Ok(())
}
