//! Report command for showing where a day's attention went.
//!
//! This module implements `dwell report` for a single day (today by default)
//! in human-readable and JSON formats.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use dwell_core::{DayStats, ResourceKey, Settings, parse_day};
use dwell_db::Database;

/// Number of domains listed before the rest are summarized.
const TOP_DOMAINS: usize = 8;

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub day: NaiveDate,
    pub stats: DayStats,
    /// Active daily limits in seconds, for the domains in `stats`.
    pub limits: BTreeMap<ResourceKey, u64>,
}

impl ReportData {
    pub fn new(day: NaiveDate, stats: DayStats, settings: &Settings) -> Self {
        let limits = stats
            .daily
            .keys()
            .filter_map(|key| {
                settings
                    .daily_limit_seconds(key)
                    .map(|limit| (key.clone(), limit))
            })
            .collect();
        Self { day, stats, limits }
    }

    /// Seconds per hour of day across all domains.
    fn by_hour(&self) -> BTreeMap<u32, u64> {
        let mut hours = BTreeMap::new();
        for per_hour in self.stats.hourly.values() {
            for (hour, seconds) in per_hour {
                *hours.entry(*hour).or_insert(0) += seconds;
            }
        }
        hours
    }
}

// ========== Duration Formatting ==========

/// Formats seconds as a short duration.
///
/// Below a minute: "Xs". Below an hour: "Xm Ys" (or "Xm"). Otherwise "Xh Ym"
/// (or "Xh"); seconds are dropped once a duration reaches an hour.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 3600 {
        let minutes = seconds / 60;
        let rest = seconds % 60;
        return if rest > 0 {
            format!("{minutes}m {rest}s")
        } else {
            format!("{minutes}m")
        };
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if minutes > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{hours}h")
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: u64, max: u64) -> String {
    if max == 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// ========== Report Rendering ==========

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    writeln!(output, "DWELL REPORT: {}", data.day.format("%A, %b %-d, %Y")).unwrap();

    if data.stats.daily.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "No time recorded this day.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'dwell status' to check tracking settings.").unwrap();
        return output;
    }

    let ranked = data.stats.ranked();
    let max = ranked.first().map_or(0, |(_, seconds)| *seconds);

    writeln!(output).unwrap();
    writeln!(output, "BY DOMAIN").unwrap();
    writeln!(output, "─────────").unwrap();
    for (resource, seconds) in ranked.iter().take(TOP_DOMAINS) {
        let name = resource.as_str();
        let duration = format_duration(*seconds);
        let bar = progress_bar(*seconds, max);
        write!(output, "{name:<30}{duration:>8}  {bar}").unwrap();
        if let Some(limit) = data.limits.get(*resource) {
            let marker = if *seconds >= *limit { " (over)" } else { "" };
            write!(output, "  limit {}{marker}", format_duration(*limit)).unwrap();
        }
        writeln!(output).unwrap();
    }
    let remaining = ranked.len().saturating_sub(TOP_DOMAINS);
    if remaining > 0 {
        writeln!(output, "... and {remaining} more").unwrap();
    }

    let hours = data.by_hour();
    let busiest = hours.values().copied().max().unwrap_or(0);
    writeln!(output).unwrap();
    writeln!(output, "BY HOUR").unwrap();
    writeln!(output, "───────").unwrap();
    for (hour, seconds) in &hours {
        let label = format!("{hour}:00");
        let duration = format_duration(*seconds);
        let bar = progress_bar(*seconds, busiest);
        writeln!(output, "{label:>5}  {duration:>8}  {bar}").unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "Total tracked:  {}",
        format_duration(data.stats.total_seconds())
    )
    .unwrap();
    writeln!(output, "Domains:        {}", ranked.len()).unwrap();

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub date: String,
    pub total_seconds: u64,
    pub resources: Vec<JsonResource>,
}

#[derive(Debug, Serialize)]
pub struct JsonResource {
    pub resource: String,
    pub seconds: u64,
    pub limit_seconds: Option<u64>,
    pub hours: BTreeMap<u32, u64>,
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let resources = data
        .stats
        .ranked()
        .into_iter()
        .map(|(resource, seconds)| JsonResource {
            resource: resource.to_string(),
            seconds,
            limit_seconds: data.limits.get(resource).copied(),
            hours: data.stats.hourly.get(resource).cloned().unwrap_or_default(),
        })
        .collect();

    let report = JsonReport {
        date: data.day.format("%Y-%m-%d").to_string(),
        total_seconds: data.stats.total_seconds(),
        resources,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: std::io::Write>(
    writer: &mut W,
    db: &mut Database,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let day = match date {
        Some(date) => parse_day(date)?,
        None => Local::now().date_naive(),
    };
    let settings = db.load_settings()?;
    let stats = db.stats_for_day(day)?;
    let data = ReportData::new(day, stats, &settings);

    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }

    Ok(())
}
