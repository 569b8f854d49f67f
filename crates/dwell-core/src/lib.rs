//! Core domain logic for dwell.
//!
//! This crate contains the session-timing and attribution engine:
//! - Focus arbitration: deciding which single subject accumulates time
//! - Session timing: start, stop and expiry of the live session
//! - Activity: idle detection and pause/resume reports
//!
//! Storage, timers, clocks and notifications are reached through the traits in
//! [`host`]; nothing here performs I/O.

pub mod activity;
pub mod control;
pub mod event;
pub mod host;
pub mod session;
pub mod settings;
pub mod stats;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

pub use activity::{ActivityDetector, ActivityMonitor, ActivitySignal, ActivityState};
pub use control::{Request, Response};
pub use event::HostEvent;
pub use host::{
    Clock, CommitReceipt, Ledger, LedgerError, Notification, NotificationKind, Notifier, Scheduler,
    SystemClock, TimerHandle,
};
pub use session::{MIN_COMMIT_SECONDS, Session, SessionTimer};
pub use settings::Settings;
pub use stats::{DayStats, RangeStats, render_csv};
pub use tracker::{SchedulerState, Tracker, TrackerStatus, TrackingStatus};
pub use types::{ResourceKey, SubjectId, ValidationError, parse_day, parse_day_range};
