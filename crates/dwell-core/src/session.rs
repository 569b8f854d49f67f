//! The session timer.
//!
//! Owns the single live [`Session`] and its pending expiry callback. The timer
//! decides *what* to commit; the tracker decides *whether* a session may run
//! and performs the commit.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::host::{Scheduler, TimerHandle};
use crate::types::{ResourceKey, SubjectId};

/// Sessions this short or shorter are dropped on stop to filter tab flicker.
pub const MIN_COMMIT_SECONDS: u64 = 5;

/// The live accounting interval for the focused subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub subject: SubjectId,
    /// Resource the session's time is attributed to, captured at start.
    pub resource: ResourceKey,
    pub started_at: DateTime<Local>,
    pub planned_seconds: u64,
    #[serde(skip)]
    timer: TimerHandle,
}

impl Session {
    pub const fn timer(&self) -> TimerHandle {
        self.timer
    }
}

/// Time to be committed for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub subject: SubjectId,
    pub resource: ResourceKey,
    pub seconds: u64,
}

/// Outcome of a fired expiry callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// The callback does not belong to the live session.
    Stale,
    /// The live session ran its full planned duration and has ended.
    Completed(Session),
}

/// Holder of the at-most-one live session.
#[derive(Debug, Default)]
pub struct SessionTimer {
    live: Option<Session>,
}

impl SessionTimer {
    pub const fn live(&self) -> Option<&Session> {
        self.live.as_ref()
    }

    pub fn live_subject(&self) -> Option<SubjectId> {
        self.live.as_ref().map(|session| session.subject)
    }

    pub fn is_live_for(&self, subject: SubjectId) -> bool {
        self.live_subject() == Some(subject)
    }

    /// Starts a session, stopping any live one first.
    ///
    /// Returns the flush of the session that was stopped, if any. The previous
    /// expiry callback is always cancelled before the new one is scheduled.
    pub fn start<S: Scheduler>(
        &mut self,
        subject: SubjectId,
        resource: ResourceKey,
        planned_seconds: u64,
        now: DateTime<Local>,
        scheduler: &mut S,
    ) -> Option<Flush> {
        let flushed = self.stop(now, scheduler);
        let timer = scheduler.schedule(Duration::from_secs(planned_seconds), subject);
        tracing::debug!(%subject, %resource, planned_seconds, "session started");
        self.live = Some(Session {
            subject,
            resource,
            started_at: now,
            planned_seconds,
            timer,
        });
        flushed
    }

    /// Stops the live session, cancelling its expiry callback.
    ///
    /// Returns the elapsed whole seconds to commit, or `None` if nothing was
    /// live or the session lasted [`MIN_COMMIT_SECONDS`] or less.
    pub fn stop<S: Scheduler>(&mut self, now: DateTime<Local>, scheduler: &mut S) -> Option<Flush> {
        let session = self.live.take()?;
        scheduler.cancel(session.timer);

        let elapsed = u64::try_from((now - session.started_at).num_seconds()).unwrap_or(0);
        tracing::debug!(subject = %session.subject, resource = %session.resource, elapsed, "session stopped");
        if elapsed <= MIN_COMMIT_SECONDS {
            return None;
        }
        Some(Flush {
            subject: session.subject,
            resource: session.resource,
            seconds: elapsed,
        })
    }

    /// Handles a fired expiry callback.
    ///
    /// Only the callback scheduled for the live session completes it; the
    /// fired handle is not cancelled because it has already been delivered.
    pub fn expire(&mut self, handle: TimerHandle) -> Expiry {
        match self.live.take() {
            Some(session) if session.timer == handle => Expiry::Completed(session),
            other => {
                self.live = other;
                Expiry::Stale
            }
        }
    }
}
