//! Control-plane requests and their replies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::DayStats;
use crate::tracker::{TrackerStatus, TrackingStatus};

/// A request from a settings or statistics surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    ToggleTracking {
        enabled: bool,
    },
    GetStatus,
    SetReminderInterval {
        seconds: u64,
    },
    SendTestReminder,
    GetStatsForDay {
        /// `YYYY-MM-DD` or an RFC 3339 timestamp.
        date: String,
    },
    GetStatsToday,
    UpdateActivitySettings {
        track_inactive_time: bool,
        threshold_minutes: u64,
    },
    UpdateTimeLimits {
        limits: BTreeMap<String, u32>,
        enabled: bool,
    },
    UpdateRetention {
        days: u32,
        #[serde(default)]
        cleanup_now: bool,
    },
    ExportRange {
        start_date: String,
        end_date: String,
    },
    ClearAllData,
}

/// Successful reply payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Tracking { status: TrackingStatus },
    Status(TrackerStatus),
    Interval { interval: u64 },
    Stats(DayStats),
    Retention {
        days: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pruned_days: Option<usize>,
    },
    Csv { csv: String },
    Done {},
}
