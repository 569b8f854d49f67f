//! Collaborators the tracker depends on.
//!
//! The tracker never reads the system clock, sleeps, touches storage or shows
//! anything itself. The host (the `dwell run` daemon, or a simulated host in
//! tests) provides these capabilities through the traits below.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::types::{ResourceKey, SubjectId};

/// Source of wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Handle to a scheduled expiry callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Single-shot, cancellable timers.
///
/// When a timer fires, the host calls `Tracker::on_expire` with the handle that
/// `schedule` returned. A cancelled handle must never be delivered.
pub trait Scheduler {
    fn schedule(&mut self, after: Duration, subject: SubjectId) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Result of adding time to the aggregation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Calendar day the seconds were attributed to.
    pub day: NaiveDate,
    /// Hour of day the seconds were attributed to.
    pub hour: u32,
    /// Daily total for the resource before this commit.
    pub previous_total: u64,
    /// Daily total for the resource after this commit.
    pub new_total: u64,
}

impl CommitReceipt {
    /// Whether this commit moved the daily total from below `limit` to at or above it.
    pub const fn crossed(&self, limit: u64) -> bool {
        self.previous_total < limit && self.new_total >= limit
    }
}

/// A failed commit. The interval's time is dropped, never retried.
#[derive(Debug, Error)]
#[error("failed to record time: {0}")]
pub struct LedgerError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Append-only time aggregation.
pub trait Ledger {
    /// Adds `seconds` to the daily and hourly buckets derived from `at`.
    fn commit(
        &mut self,
        resource: &ResourceKey,
        seconds: u64,
        at: DateTime<Local>,
    ) -> Result<CommitReceipt, LedgerError>;
}

/// Kind of transient alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Reminder,
    LimitReached,
    Test,
}

/// A fire-and-forget alert for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKey>,
}

impl Notification {
    /// Periodic "you've been here a while" reminder.
    pub fn reminder(resource: &ResourceKey, interval_seconds: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let minutes = (interval_seconds as f64 / 60.0 * 10.0).round() / 10.0;
        let plural = if (minutes - 1.0).abs() < f64::EPSILON { "" } else { "s" };
        Self {
            kind: NotificationKind::Reminder,
            title: "Mindful Ping".to_string(),
            message: format!(
                "You've been browsing {resource} for {minutes} minute{plural}. Time for a mindful break?"
            ),
            resource: Some(resource.clone()),
        }
    }

    /// The daily limit for a resource was reached.
    pub fn limit_reached(resource: &ResourceKey, limit_seconds: u64) -> Self {
        let minutes = limit_seconds / 60;
        let plural = if minutes == 1 { "" } else { "s" };
        Self {
            kind: NotificationKind::LimitReached,
            title: "Daily limit reached".to_string(),
            message: format!("You've spent {minutes} minute{plural} on {resource} today."),
            resource: Some(resource.clone()),
        }
    }

    /// Generic notification used to check that alerts are delivered.
    pub fn test() -> Self {
        Self {
            kind: NotificationKind::Test,
            title: "Mindful Ping Test".to_string(),
            message: "Test successful! Mindful browsing reminders are working.".to_string(),
            resource: None,
        }
    }
}

/// Displays notifications.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}
