//! Tracking settings shared by the daemon and the offline commands.
//!
//! Settings are persisted field by field in the store (see `dwell-db`), so every
//! field has a serde default: a store written by an older version simply lacks
//! the newer keys, and the defaults are filled in and written back on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ResourceKey, ValidationError};

/// Default reminder interval (10 minutes).
pub const DEFAULT_REMINDER_INTERVAL_SECONDS: u64 = 600;
/// Default idle time after which a subject counts as inactive (5 minutes).
pub const DEFAULT_INACTIVITY_THRESHOLD_SECONDS: u64 = 300;
/// Longest reminder interval (24 hours).
pub const MAX_REMINDER_INTERVAL_SECONDS: u64 = 86_400;
/// Longest inactivity threshold (24 hours).
pub const MAX_INACTIVITY_THRESHOLD_SECONDS: u64 = 86_400;
/// Default number of days of statistics to keep.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Process-wide tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master switch for tracking.
    pub enabled: bool,
    /// Length of a session before a reminder fires and the session renews.
    pub reminder_interval_seconds: u64,
    /// Keep crediting time while the user is idle on the focused subject.
    pub track_inactive_time: bool,
    /// Idle time after which a subject is reported inactive.
    pub inactivity_threshold_seconds: u64,
    /// Daily limits in minutes, keyed by resource.
    pub daily_limit_minutes: BTreeMap<ResourceKey, u32>,
    /// Whether daily limits raise notifications.
    pub time_limit_enabled: bool,
    /// Days of statistics kept by retention pruning.
    pub retention_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_interval_seconds: DEFAULT_REMINDER_INTERVAL_SECONDS,
            track_inactive_time: false,
            inactivity_threshold_seconds: DEFAULT_INACTIVITY_THRESHOLD_SECONDS,
            daily_limit_minutes: BTreeMap::new(),
            time_limit_enabled: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Settings {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        in_range(
            "reminder interval seconds",
            self.reminder_interval_seconds,
            1,
            MAX_REMINDER_INTERVAL_SECONDS,
        )?;
        in_range(
            "inactivity threshold seconds",
            self.inactivity_threshold_seconds,
            60,
            MAX_INACTIVITY_THRESHOLD_SECONDS,
        )?;
        at_least("retention days", u64::from(self.retention_days), 1)?;
        for minutes in self.daily_limit_minutes.values() {
            at_least("daily limit minutes", u64::from(*minutes), 1)?;
        }
        Ok(())
    }

    pub fn set_reminder_interval(&mut self, seconds: u64) -> Result<(), ValidationError> {
        in_range(
            "reminder interval seconds",
            seconds,
            1,
            MAX_REMINDER_INTERVAL_SECONDS,
        )?;
        self.reminder_interval_seconds = seconds;
        Ok(())
    }

    /// Updates inactivity handling. The threshold is given in whole minutes.
    pub fn set_activity(
        &mut self,
        track_inactive_time: bool,
        threshold_minutes: u64,
    ) -> Result<(), ValidationError> {
        in_range(
            "inactivity threshold minutes",
            threshold_minutes,
            1,
            MAX_INACTIVITY_THRESHOLD_SECONDS / 60,
        )?;
        self.track_inactive_time = track_inactive_time;
        self.inactivity_threshold_seconds = threshold_minutes * 60;
        Ok(())
    }

    /// Replaces the daily limit table.
    ///
    /// Keys are normalized with [`ResourceKey::for_limit`]. Nothing changes if
    /// any entry is invalid.
    pub fn set_time_limits(
        &mut self,
        limits: &BTreeMap<String, u32>,
        enabled: bool,
    ) -> Result<(), ValidationError> {
        let mut normalized = BTreeMap::new();
        for (raw, minutes) in limits {
            at_least("daily limit minutes", u64::from(*minutes), 1)?;
            normalized.insert(ResourceKey::for_limit(raw)?, *minutes);
        }
        self.daily_limit_minutes = normalized;
        self.time_limit_enabled = enabled;
        Ok(())
    }

    pub fn set_retention(&mut self, days: u32) -> Result<(), ValidationError> {
        at_least("retention days", u64::from(days), 1)?;
        self.retention_days = days;
        Ok(())
    }

    /// The active daily limit for a resource in seconds, if limits are enabled.
    ///
    /// Subdomains inherit a limit set on their parent domain, so a limit on
    /// `youtube.com` also covers `m.youtube.com`.
    pub fn daily_limit_seconds(&self, resource: &ResourceKey) -> Option<u64> {
        if !self.time_limit_enabled {
            return None;
        }
        let host = resource.as_str();
        let host = host.strip_prefix("www.").unwrap_or(host);
        self.daily_limit_minutes
            .iter()
            .find(|(limited, _)| {
                let limited = limited.as_str();
                host == limited
                    || host
                        .strip_suffix(limited)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|(_, minutes)| u64::from(*minutes) * 60)
    }
}

fn at_least(field: &'static str, value: u64, min: u64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::TooSmall { field, min, value });
    }
    Ok(())
}

fn in_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ValidationError> {
    at_least(field, value, min)?;
    if value > max {
        return Err(ValidationError::TooLarge { field, max, value });
    }
    Ok(())
}
