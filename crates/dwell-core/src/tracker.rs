//! The focus arbiter.
//!
//! [`Tracker`] is the single source of truth for which subject, if any, is
//! accumulating time. Every host event and control request is a discrete,
//! synchronous transition on the tracker's [`SchedulerState`]; the host only
//! has to deliver events in order and call [`Tracker::on_expire`] when a
//! scheduled timer fires.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::activity::{ActivityMonitor, ActivitySignal, ActivityState};
use crate::event::{HostEvent, local_from_millis, resource_for};
use crate::host::{Clock, CommitReceipt, Ledger, Notification, Notifier, Scheduler, SystemClock, TimerHandle};
use crate::session::{Expiry, SessionTimer};
use crate::settings::Settings;
use crate::types::{ResourceKey, SubjectId, ValidationError};

/// What the tracker knows about one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectState {
    pub resource: ResourceKey,
    pub activity: ActivityState,
}

impl SubjectState {
    fn new(resource: ResourceKey) -> Self {
        Self {
            resource,
            activity: ActivityState::default(),
        }
    }
}

/// All mutable tracking state.
#[derive(Debug)]
pub struct SchedulerState {
    window_focused: bool,
    focus_target: Option<SubjectId>,
    subjects: HashMap<SubjectId, SubjectState>,
    session: SessionTimer,
    limit_alerts: HashSet<(NaiveDate, ResourceKey)>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            window_focused: true,
            focus_target: None,
            subjects: HashMap::new(),
            session: SessionTimer::default(),
            limit_alerts: HashSet::new(),
        }
    }
}

impl SchedulerState {
    pub const fn window_focused(&self) -> bool {
        self.window_focused
    }

    /// The subject most recently offered focus, whether or not it is timed.
    pub const fn focus_target(&self) -> Option<SubjectId> {
        self.focus_target
    }

    pub fn subject(&self, subject: SubjectId) -> Option<&SubjectState> {
        self.subjects.get(&subject)
    }

    pub const fn session(&self) -> &SessionTimer {
        &self.session
    }

    fn is_paused(&self, subject: SubjectId) -> bool {
        self.subjects
            .get(&subject)
            .is_some_and(|state| state.activity.is_paused)
    }

    fn resource_of(&self, subject: SubjectId) -> ResourceKey {
        self.subjects
            .get(&subject)
            .map_or_else(ResourceKey::unknown, |state| state.resource.clone())
    }
}

/// Reply to `toggleTracking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    Enabled,
    Disabled,
}

/// Reply to `getStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStatus {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub current_subject: Option<SubjectId>,
    pub current_resource: Option<ResourceKey>,
    /// Whether a session is live for the current subject.
    pub timing: bool,
    pub session_started_at: Option<DateTime<Local>>,
    pub window_focused: bool,
    pub track_inactive_time: bool,
    pub inactivity_threshold_seconds: u64,
    pub is_paused: bool,
    pub activity: Option<ActivityState>,
}

/// The session-timing and attribution engine.
pub struct Tracker<S, L, N, C = SystemClock> {
    settings: Settings,
    state: SchedulerState,
    monitor: ActivityMonitor,
    clock: C,
    scheduler: S,
    ledger: L,
    notifier: N,
}

impl<S: Scheduler, L: Ledger, N: Notifier> Tracker<S, L, N> {
    pub fn new(settings: Settings, scheduler: S, ledger: L, notifier: N) -> Self {
        Self::with_clock(settings, SystemClock, scheduler, ledger, notifier)
    }
}

impl<S: Scheduler, L: Ledger, N: Notifier, C: Clock> Tracker<S, L, N, C> {
    pub fn with_clock(settings: Settings, clock: C, scheduler: S, ledger: L, notifier: N) -> Self {
        let monitor = ActivityMonitor::new(settings.inactivity_threshold_seconds);
        Self {
            settings,
            state: SchedulerState::default(),
            monitor,
            clock,
            scheduler,
            ledger,
            notifier,
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Applies one host event.
    pub fn handle(&mut self, event: HostEvent) {
        tracing::trace!(?event, "host event");
        match event {
            HostEvent::TabActivated { subject, url } => {
                self.observe_url(subject, url.as_deref());
                self.on_focus_candidate(subject);
            }
            HostEvent::TabUpdated {
                subject,
                url,
                complete,
                active,
            } => {
                let navigated = self.observe_url(subject, url.as_deref());
                if active && complete {
                    self.on_focus_candidate(subject);
                } else if navigated && self.state.session.is_live_for(subject) {
                    // Close out the old resource before the page finishes loading.
                    self.on_focus_candidate(subject);
                }
            }
            HostEvent::TabRemoved { subject } => self.on_subject_removed(subject),
            HostEvent::WindowBlur => self.on_window_blur(),
            HostEvent::WindowFocus { subject } => self.on_window_focus(subject),
            HostEvent::UserInput { subject } => self.on_user_input(subject),
            HostEvent::UserActive { subject } => self.report_active(subject),
            HostEvent::UserInactive { subject, idle_ms } => {
                self.report_inactive(subject, Duration::from_millis(idle_ms));
            }
            HostEvent::ActivityStatus {
                subject,
                is_active,
                last_activity_at,
            } => self.report_status(subject, is_active, last_activity_at.and_then(local_from_millis)),
            HostEvent::PageHidden { subject } => self.on_page_hidden(subject),
            HostEvent::PageVisible { subject } => self.on_page_visible(subject),
        }
    }

    /// Offers focus to `subject`.
    ///
    /// The subject always becomes the focus target. A session is started for
    /// it only while tracking is enabled, the window is focused and the subject
    /// is not paused; otherwise any live session is stopped.
    pub fn on_focus_candidate(&mut self, subject: SubjectId) {
        self.state.focus_target = Some(subject);
        self.state
            .subjects
            .entry(subject)
            .or_insert_with(|| SubjectState::new(ResourceKey::unknown()));

        if !self.eligible(subject) {
            tracing::debug!(%subject, "focus candidate not eligible for timing");
            self.stop_session();
            return;
        }
        self.start_session(subject);
    }

    pub fn on_window_blur(&mut self) {
        self.state.window_focused = false;
        self.stop_session();
    }

    pub fn on_window_focus(&mut self, active: Option<SubjectId>) {
        self.state.window_focused = true;
        if let Some(subject) = active {
            self.on_focus_candidate(subject);
        }
    }

    /// Forgets a closed subject, committing its live session first.
    pub fn on_subject_removed(&mut self, subject: SubjectId) {
        if self.state.session.is_live_for(subject) {
            self.stop_session();
        }
        self.state.subjects.remove(&subject);
        self.monitor.remove(subject);
        if self.state.focus_target == Some(subject) {
            self.state.focus_target = None;
        }
        tracing::debug!(%subject, "subject removed");
    }

    /// Handles a fired expiry callback.
    ///
    /// Commits the full planned duration, sends the reminder and renews the
    /// session if the subject still holds focus. Stale callbacks are ignored.
    pub fn on_expire(&mut self, handle: TimerHandle) {
        let session = match self.state.session.expire(handle) {
            Expiry::Stale => {
                tracing::debug!(?handle, "ignoring stale expiry");
                return;
            }
            Expiry::Completed(session) => session,
        };

        let now = self.clock.now();
        self.commit(&session.resource, session.planned_seconds, now);
        self.notifier
            .notify(Notification::reminder(&session.resource, session.planned_seconds));

        let subject = session.subject;
        if self.state.focus_target == Some(subject)
            && self.state.subjects.contains_key(&subject)
            && self.eligible(subject)
        {
            self.start_session(subject);
        }
    }

    /// The subject's user went from idle to active.
    pub fn report_active(&mut self, subject: SubjectId) {
        let now = self.clock.now();
        let Some(state) = self.state.subjects.get_mut(&subject) else {
            tracing::debug!(%subject, "activity report for unknown subject");
            return;
        };
        state.activity.mark_active(now);
        if self.settings.track_inactive_time {
            return;
        }
        self.resume(subject);
    }

    /// The subject's user has been idle for `idle`.
    pub fn report_inactive(&mut self, subject: SubjectId, idle: Duration) {
        let Some(state) = self.state.subjects.get_mut(&subject) else {
            tracing::debug!(%subject, "activity report for unknown subject");
            return;
        };
        state.activity.mark_inactive();
        if self.settings.track_inactive_time || self.state.focus_target != Some(subject) {
            return;
        }
        tracing::info!(%subject, idle_secs = idle.as_secs(), "user inactive, pausing");
        self.pause(subject);
    }

    /// Records a periodic status report without affecting timing.
    pub fn report_status(
        &mut self,
        subject: SubjectId,
        is_active: bool,
        last_activity_at: Option<DateTime<Local>>,
    ) {
        if let Some(state) = self.state.subjects.get_mut(&subject) {
            state.activity.record_status(is_active, last_activity_at);
        }
    }

    pub fn on_page_hidden(&mut self, subject: SubjectId) {
        if self.settings.track_inactive_time || !self.state.subjects.contains_key(&subject) {
            return;
        }
        self.pause(subject);
    }

    pub fn on_page_visible(&mut self, subject: SubjectId) {
        self.resume(subject);
    }

    /// Feeds raw input to the built-in idle detector.
    pub fn on_user_input(&mut self, subject: SubjectId) {
        let now = self.clock.now();
        if let Some(ActivitySignal::Active) = self.monitor.record_input(subject, now) {
            self.report_active(subject);
        }
    }

    /// Polls the built-in idle detectors and applies their reports.
    pub fn poll_activity(&mut self) {
        let now = self.clock.now();
        for report in self.monitor.poll(now) {
            match report.signal {
                Some(ActivitySignal::Active) => self.report_active(report.subject),
                Some(ActivitySignal::Inactive { idle }) => {
                    self.report_inactive(report.subject, idle.to_std().unwrap_or_default());
                }
                None => {}
            }
            self.report_status(
                report.subject,
                report.snapshot.is_active,
                Some(report.snapshot.last_activity_at),
            );
        }
    }

    pub fn toggle_tracking(&mut self, enabled: bool) -> TrackingStatus {
        self.settings.enabled = enabled;
        if enabled {
            tracing::info!("tracking enabled");
            self.resume_target();
            TrackingStatus::Enabled
        } else {
            tracing::info!("tracking disabled");
            self.stop_session();
            TrackingStatus::Disabled
        }
    }

    /// Changes the session length, restarting a live session with it.
    pub fn set_reminder_interval(&mut self, seconds: u64) -> Result<u64, ValidationError> {
        self.settings.set_reminder_interval(seconds)?;
        if let Some(subject) = self.state.session.live_subject() {
            self.start_session(subject);
        }
        Ok(self.settings.reminder_interval_seconds)
    }

    pub fn update_activity_settings(
        &mut self,
        track_inactive_time: bool,
        threshold_minutes: u64,
    ) -> Result<(), ValidationError> {
        self.settings.set_activity(track_inactive_time, threshold_minutes)?;
        self.monitor
            .set_threshold(self.settings.inactivity_threshold_seconds);

        if track_inactive_time {
            for state in self.state.subjects.values_mut() {
                state.activity.is_paused = false;
            }
            self.resume_target();
        } else if let Some(target) = self.state.focus_target {
            let idle = self
                .state
                .subjects
                .get(&target)
                .is_some_and(|state| !state.activity.is_active);
            if idle {
                self.pause(target);
            }
        }
        Ok(())
    }

    pub fn update_time_limits(
        &mut self,
        limits: &BTreeMap<String, u32>,
        enabled: bool,
    ) -> Result<(), ValidationError> {
        self.settings.set_time_limits(limits, enabled)
    }

    pub fn update_retention(&mut self, days: u32) -> Result<(), ValidationError> {
        self.settings.set_retention(days)
    }

    pub fn status(&self) -> TrackerStatus {
        let current = self.state.focus_target;
        let subject_state = current.and_then(|subject| self.state.subjects.get(&subject));
        let live = self
            .state
            .session
            .live()
            .filter(|session| Some(session.subject) == current);
        TrackerStatus {
            enabled: self.settings.enabled,
            interval_seconds: self.settings.reminder_interval_seconds,
            current_subject: current,
            current_resource: subject_state.map(|state| state.resource.clone()),
            timing: live.is_some(),
            session_started_at: live.map(|session| session.started_at),
            window_focused: self.state.window_focused,
            track_inactive_time: self.settings.track_inactive_time,
            inactivity_threshold_seconds: self.settings.inactivity_threshold_seconds,
            is_paused: subject_state.is_some_and(|state| state.activity.is_paused),
            activity: subject_state.map(|state| state.activity.clone()),
        }
    }

    /// Shows a reminder for the live session, or a generic test alert.
    ///
    /// No time is committed.
    pub fn send_test_reminder(&mut self) {
        let notification = self.state.session.live().map_or_else(Notification::test, |session| {
            Notification::reminder(&session.resource, self.settings.reminder_interval_seconds)
        });
        self.notifier.notify(notification);
    }

    /// Re-arms limit alerts after the statistics they refer to were cleared.
    pub fn reset_limit_alerts(&mut self) {
        self.state.limit_alerts.clear();
    }

    /// Flushes the live session.
    pub fn shutdown(&mut self) {
        self.stop_session();
    }

    fn eligible(&self, subject: SubjectId) -> bool {
        self.settings.enabled
            && self.state.window_focused
            && (self.settings.track_inactive_time || !self.state.is_paused(subject))
    }

    /// Records the subject's URL. Returns `true` if a known subject changed resource.
    fn observe_url(&mut self, subject: SubjectId, url: Option<&str>) -> bool {
        match self.state.subjects.get_mut(&subject) {
            Some(state) => {
                if url.is_none() {
                    return false;
                }
                let resource = resource_for(url);
                if state.resource == resource {
                    return false;
                }
                state.resource = resource;
                true
            }
            None => {
                self.state
                    .subjects
                    .insert(subject, SubjectState::new(resource_for(url)));
                false
            }
        }
    }

    fn start_session(&mut self, subject: SubjectId) {
        let now = self.clock.now();
        let resource = self.state.resource_of(subject);
        let interval = self.settings.reminder_interval_seconds;
        let flushed = self
            .state
            .session
            .start(subject, resource, interval, now, &mut self.scheduler);
        if let Some(flush) = flushed {
            self.commit(&flush.resource, flush.seconds, now);
        }
    }

    fn stop_session(&mut self) {
        let now = self.clock.now();
        if let Some(flush) = self.state.session.stop(now, &mut self.scheduler) {
            self.commit(&flush.resource, flush.seconds, now);
        }
    }

    fn pause(&mut self, subject: SubjectId) {
        if let Some(state) = self.state.subjects.get_mut(&subject) {
            state.activity.is_paused = true;
        }
        if self.state.session.is_live_for(subject) {
            self.stop_session();
        }
    }

    /// Clears a pause and restarts timing if the subject still holds focus.
    fn resume(&mut self, subject: SubjectId) {
        let Some(state) = self.state.subjects.get_mut(&subject) else {
            return;
        };
        if !state.activity.is_paused {
            return;
        }
        state.activity.is_paused = false;
        tracing::info!(%subject, "resuming");
        if self.state.focus_target == Some(subject) {
            self.resume_target();
        }
    }

    fn resume_target(&mut self) {
        let Some(target) = self.state.focus_target else {
            return;
        };
        if self.eligible(target) && !self.state.session.is_live_for(target) {
            self.start_session(target);
        }
    }

    fn commit(&mut self, resource: &ResourceKey, seconds: u64, at: DateTime<Local>) {
        match self.ledger.commit(resource, seconds, at) {
            Ok(receipt) => {
                tracing::info!(%resource, seconds, total = receipt.new_total, "time recorded");
                self.check_limit(resource, receipt);
            }
            Err(err) => {
                tracing::warn!(%resource, seconds, error = %err, "dropping unrecorded time");
            }
        }
    }

    fn check_limit(&mut self, resource: &ResourceKey, receipt: CommitReceipt) {
        let Some(limit) = self.settings.daily_limit_seconds(resource) else {
            return;
        };
        if !receipt.crossed(limit) {
            return;
        }
        // Alerts from earlier days can never fire again.
        self.state.limit_alerts.retain(|(day, _)| *day >= receipt.day);
        if self.state.limit_alerts.insert((receipt.day, resource.clone())) {
            tracing::info!(%resource, limit, "daily limit reached");
            self.notifier
                .notify(Notification::limit_reached(resource, limit));
        }
    }
}
