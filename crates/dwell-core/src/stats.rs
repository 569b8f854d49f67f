//! Aggregated statistics and CSV export.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::ResourceKey;

/// Seconds per resource for one calendar day, overall and per hour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub daily: BTreeMap<ResourceKey, u64>,
    pub hourly: BTreeMap<ResourceKey, BTreeMap<u32, u64>>,
}

impl DayStats {
    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.hourly.is_empty()
    }

    pub fn total_seconds(&self) -> u64 {
        self.daily.values().sum()
    }

    /// Resources ordered by time spent, largest first; ties by name.
    pub fn ranked(&self) -> Vec<(&ResourceKey, u64)> {
        let mut ranked: Vec<_> = self.daily.iter().map(|(key, secs)| (key, *secs)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Statistics for every day in a range that has data, keyed by day.
pub type RangeStats = BTreeMap<NaiveDate, DayStats>;

pub const CSV_HEADER: &str = "Date,Resource,TimeSpent(min),TimeSpent(sec),Hour,SessionCount";

/// Renders range statistics as CSV.
///
/// Each resource gets one row per day with an empty hour column, followed by
/// one row per hour it was active in. Session counts are not tracked and are
/// always written as `1`.
pub fn render_csv(stats: &RangeStats) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for (day, day_stats) in stats {
        let date = day.format("%Y-%m-%d").to_string();
        for (resource, seconds) in &day_stats.daily {
            push_row(&mut out, &date, resource, *seconds, None);
            if let Some(hours) = day_stats.hourly.get(resource) {
                for (hour, seconds) in hours {
                    push_row(&mut out, &date, resource, *seconds, Some(*hour));
                }
            }
        }
    }
    out
}

fn push_row(out: &mut String, date: &str, resource: &ResourceKey, seconds: u64, hour: Option<u32>) {
    let hour = hour.map(|h| format!("{h}:00")).unwrap_or_default();
    let _ = writeln!(
        out,
        "{},{},{},{},{},1",
        csv_escape(date),
        csv_escape(resource.as_str()),
        minutes_one_decimal(seconds),
        seconds,
        hour
    );
}

#[allow(clippy::cast_precision_loss)]
fn minutes_one_decimal(seconds: u64) -> String {
    format!("{:.1}", seconds as f64 / 60.0)
}

fn csv_escape(s: &str) -> String {
    let needs_quote = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    if !needs_quote {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}
