//! User activity signals.
//!
//! Two halves live here. [`ActivityState`] is what the tracker remembers per
//! subject from the reports it receives. [`ActivityMonitor`] is an optional
//! producer of those reports: hosts that forward raw input events get idle
//! detection with the same cadence and threshold rules as the browser-side
//! detector, instead of sending `userActive`/`userInactive` themselves.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::types::SubjectId;

/// Per-subject activity as last reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityState {
    pub is_active: bool,
    pub last_activity_at: Option<DateTime<Local>>,
    /// Accounting is suppressed because the subject went idle or hidden.
    pub is_paused: bool,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self {
            is_active: true,
            last_activity_at: None,
            is_paused: false,
        }
    }
}

impl ActivityState {
    /// Records an active report. Returns `false` if the subject was already active.
    pub fn mark_active(&mut self, at: DateTime<Local>) -> bool {
        self.last_activity_at = Some(at);
        if self.is_active {
            return false;
        }
        self.is_active = true;
        true
    }

    /// Records an inactive report. Returns `false` if the subject was already inactive.
    pub fn mark_inactive(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        true
    }

    /// Overwrites the status from a periodic status report.
    pub fn record_status(&mut self, is_active: bool, last_activity_at: Option<DateTime<Local>>) {
        self.is_active = is_active;
        if last_activity_at.is_some() {
            self.last_activity_at = last_activity_at;
        }
    }
}

/// A transition emitted by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    Active,
    Inactive { idle: Duration },
}

/// Point-in-time view of a detector, emitted on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub is_active: bool,
    pub last_activity_at: DateTime<Local>,
}

/// Idle detection for a single subject.
#[derive(Debug, Clone)]
pub struct ActivityDetector {
    threshold: Duration,
    last_input_at: DateTime<Local>,
    active: bool,
}

impl ActivityDetector {
    pub fn new(threshold_seconds: u64, now: DateTime<Local>) -> Self {
        Self {
            threshold: seconds(threshold_seconds),
            last_input_at: now,
            active: true,
        }
    }

    pub fn set_threshold(&mut self, threshold_seconds: u64) {
        self.threshold = seconds(threshold_seconds);
    }

    /// Records user input. Emits [`ActivitySignal::Active`] if the subject had gone idle.
    pub fn record_input(&mut self, now: DateTime<Local>) -> Option<ActivitySignal> {
        self.last_input_at = now;
        if self.active {
            return None;
        }
        self.active = true;
        Some(ActivitySignal::Active)
    }

    /// Checks for idleness.
    ///
    /// Emits [`ActivitySignal::Inactive`] once when the idle time first
    /// exceeds the threshold; later polls stay silent until input resumes.
    pub fn poll(&mut self, now: DateTime<Local>) -> (Option<ActivitySignal>, ActivitySnapshot) {
        let idle = now - self.last_input_at;
        let signal = if self.active && idle > self.threshold {
            self.active = false;
            Some(ActivitySignal::Inactive { idle })
        } else {
            None
        };
        let snapshot = ActivitySnapshot {
            is_active: self.active,
            last_activity_at: self.last_input_at,
        };
        (signal, snapshot)
    }
}

/// Output of one monitor poll for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityReport {
    pub subject: SubjectId,
    pub signal: Option<ActivitySignal>,
    pub snapshot: ActivitySnapshot,
}

/// Detectors for every subject that has forwarded raw input.
#[derive(Debug)]
pub struct ActivityMonitor {
    threshold_seconds: u64,
    detectors: HashMap<SubjectId, ActivityDetector>,
}

impl ActivityMonitor {
    pub fn new(threshold_seconds: u64) -> Self {
        Self {
            threshold_seconds,
            detectors: HashMap::new(),
        }
    }

    /// Records input for a subject, creating its detector on first use.
    pub fn record_input(&mut self, subject: SubjectId, now: DateTime<Local>) -> Option<ActivitySignal> {
        let threshold = self.threshold_seconds;
        self.detectors
            .entry(subject)
            .or_insert_with(|| ActivityDetector::new(threshold, now))
            .record_input(now)
    }

    /// Polls all detectors, ordered by subject id.
    pub fn poll(&mut self, now: DateTime<Local>) -> Vec<ActivityReport> {
        let mut reports: Vec<ActivityReport> = self
            .detectors
            .iter_mut()
            .map(|(subject, detector)| {
                let (signal, snapshot) = detector.poll(now);
                ActivityReport {
                    subject: *subject,
                    signal,
                    snapshot,
                }
            })
            .collect();
        reports.sort_by_key(|report| report.subject);
        reports
    }

    pub fn set_threshold(&mut self, threshold_seconds: u64) {
        self.threshold_seconds = threshold_seconds;
        for detector in self.detectors.values_mut() {
            detector.set_threshold(threshold_seconds);
        }
    }

    pub fn remove(&mut self, subject: SubjectId) {
        self.detectors.remove(&subject);
    }

    pub fn is_monitoring(&self, subject: SubjectId) -> bool {
        self.detectors.contains_key(&subject)
    }
}

fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(2025, 3, 12)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn duplicate_reports_are_no_ops() {
        let mut state = ActivityState::default();
        assert!(!state.mark_active(at(9, 0, 0)));
        assert!(state.mark_inactive());
        assert!(!state.mark_inactive());
        assert!(state.mark_active(at(9, 10, 0)));
        assert_eq!(state.last_activity_at, Some(at(9, 10, 0)));
    }

    #[test]
    fn detector_goes_idle_once_after_threshold() {
        let mut detector = ActivityDetector::new(300, at(9, 0, 0));

        let (signal, snapshot) = detector.poll(at(9, 4, 30));
        assert_eq!(signal, None);
        assert!(snapshot.is_active);

        // Exactly at the threshold is still active.
        let (signal, _) = detector.poll(at(9, 5, 0));
        assert_eq!(signal, None);

        let (signal, snapshot) = detector.poll(at(9, 5, 30));
        assert_eq!(
            signal,
            Some(ActivitySignal::Inactive {
                idle: Duration::seconds(330)
            })
        );
        assert!(!snapshot.is_active);
        assert_eq!(snapshot.last_activity_at, at(9, 0, 0));

        let (signal, _) = detector.poll(at(9, 6, 0));
        assert_eq!(signal, None);
    }

    #[test]
    fn huge_threshold_never_goes_idle() {
        let mut detector = ActivityDetector::new(u64::MAX, at(9, 0, 0));
        let (signal, snapshot) = detector.poll(at(23, 59, 59));
        assert_eq!(signal, None);
        assert!(snapshot.is_active);
        assert_eq!(seconds(u64::MAX), Duration::MAX);
        assert_eq!(seconds(90), Duration::seconds(90));
    }

    #[test]
    fn input_after_idle_emits_active() {
        let mut detector = ActivityDetector::new(60, at(9, 0, 0));
        assert_eq!(detector.record_input(at(9, 0, 30)), None);

        detector.poll(at(9, 2, 0));
        assert_eq!(detector.record_input(at(9, 2, 10)), Some(ActivitySignal::Active));
        assert_eq!(detector.record_input(at(9, 2, 11)), None);
    }

    #[test]
    fn monitor_only_tracks_subjects_with_input() {
        let mut monitor = ActivityMonitor::new(60);
        let first = SubjectId::new(1);
        let second = SubjectId::new(2);

        monitor.record_input(second, at(9, 0, 0));
        monitor.record_input(first, at(9, 0, 0));
        assert!(monitor.is_monitoring(first));

        let reports = monitor.poll(at(9, 2, 0));
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].subject, first);
        assert!(matches!(reports[0].signal, Some(ActivitySignal::Inactive { .. })));

        monitor.remove(first);
        assert!(!monitor.is_monitoring(first));
        assert_eq!(monitor.poll(at(9, 3, 0)).len(), 1);
    }

    #[test]
    fn threshold_changes_apply_to_existing_detectors() {
        let mut monitor = ActivityMonitor::new(600);
        let subject = SubjectId::new(7);
        monitor.record_input(subject, at(9, 0, 0));

        monitor.set_threshold(60);
        let reports = monitor.poll(at(9, 1, 30));
        assert!(matches!(reports[0].signal, Some(ActivitySignal::Inactive { .. })));
    }
}
