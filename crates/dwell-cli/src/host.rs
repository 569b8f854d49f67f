//! Timer and notification plumbing for the daemon.

use std::collections::BTreeMap;
use std::time::Duration;

use dwell_core::{Notification, Notifier, Scheduler, SubjectId, TimerHandle};
use tokio::time::Instant;

/// Deadline used when a delay would overflow the clock (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timers kept as deadlines that the event loop sleeps towards.
///
/// Nothing is spawned: the loop asks for [`next_deadline`](Self::next_deadline),
/// sleeps until it, then delivers [`pop_due`](Self::pop_due) to the tracker.
/// A cancelled timer is simply forgotten, so it can never be delivered.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    next_id: u64,
    timers: BTreeMap<TimerHandle, (Instant, SubjectId)>,
}

impl TokioScheduler {
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|(due, _)| *due).min()
    }

    /// Removes and returns every timer due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerHandle> {
        let mut due: Vec<(Instant, TimerHandle)> = self
            .timers
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(handle, (deadline, _))| (*deadline, *handle))
            .collect();
        due.sort();
        for (_, handle) in &due {
            self.timers.remove(handle);
        }
        due.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, after: Duration, subject: SubjectId) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id);
        let now = Instant::now();
        let due = now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE);
        self.timers.insert(handle, (due, subject));
        tracing::trace!(?handle, %subject, after_secs = after.as_secs(), "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.timers.remove(&handle).is_some() {
            tracing::trace!(?handle, "timer cancelled");
        }
    }
}

/// Collects notifications until the event loop writes them out.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Notification>,
}

impl Outbox {
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.queue)
    }
}

impl Notifier for Outbox {
    fn notify(&mut self, notification: Notification) {
        tracing::info!(kind = ?notification.kind, title = %notification.title, "notification");
        self.queue.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_timers_pop_in_deadline_order() {
        let mut scheduler = TokioScheduler::default();
        let late = scheduler.schedule(Duration::from_millis(20), SubjectId::new(1));
        let early = scheduler.schedule(Duration::ZERO, SubjectId::new(2));
        let never = scheduler.schedule(Duration::from_secs(3600), SubjectId::new(3));

        let now = Instant::now() + Duration::from_secs(1);
        assert_eq!(scheduler.pop_due(now), vec![early, late]);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.next_deadline().is_some());

        scheduler.cancel(never);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn oversized_delay_is_clamped_instead_of_overflowing() {
        let mut scheduler = TokioScheduler::default();
        scheduler.schedule(Duration::MAX, SubjectId::new(1));
        let deadline = scheduler.next_deadline().unwrap();
        assert!(deadline > Instant::now() + Duration::from_secs(86_400 * 365));
        assert!(scheduler.pop_due(Instant::now()).is_empty());
    }

    #[test]
    fn cancelled_timers_are_never_due() {
        let mut scheduler = TokioScheduler::default();
        let handle = scheduler.schedule(Duration::ZERO, SubjectId::new(1));
        scheduler.cancel(handle);
        assert!(scheduler.pop_due(Instant::now() + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn outbox_drains_in_order() {
        let mut outbox = Outbox::default();
        outbox.notify(Notification::test());
        outbox.notify(Notification::test());
        assert_eq!(outbox.drain().len(), 2);
        assert!(outbox.drain().is_empty());
    }
}
