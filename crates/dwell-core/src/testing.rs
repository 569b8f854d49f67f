//! In-memory collaborators for driving the tracker without real time.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use crate::host::{Clock, CommitReceipt, Ledger, LedgerError, Notification, Notifier, Scheduler, TimerHandle};
use crate::types::{ResourceKey, SubjectId};

/// Local time on 2025-03-12.
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    at_day(12, h, m, s)
}

/// Local time on the given day of March 2025.
pub fn at_day(day: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap();
    Local.from_local_datetime(&naive).earliest().unwrap()
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FakeClock(Rc<Cell<DateTime<Local>>>);

impl FakeClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    pub fn set(&self, now: DateTime<Local>) {
        self.0.set(now);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(at(9, 0, 0))
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        self.0.get()
    }
}

/// Records scheduled timers with their due times.
#[derive(Debug, Default)]
pub struct FakeScheduler {
    clock: FakeClock,
    next_id: u64,
    pending: BTreeMap<TimerHandle, (DateTime<Local>, SubjectId)>,
    pub cancelled: Vec<TimerHandle>,
}

impl FakeScheduler {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns the earliest timer due at or before `until`.
    pub fn take_due(&mut self, until: DateTime<Local>) -> Option<(TimerHandle, DateTime<Local>)> {
        let (handle, due) = self
            .pending
            .iter()
            .filter(|(_, (due, _))| *due <= until)
            .min_by_key(|(handle, (due, _))| (*due, *handle))
            .map(|(handle, (due, _))| (*handle, *due))?;
        self.pending.remove(&handle);
        Some((handle, due))
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(&mut self, after: Duration, subject: SubjectId) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id);
        let due = self.clock.now() + chrono::Duration::from_std(after).unwrap();
        self.pending.insert(handle, (due, subject));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(&handle);
        self.cancelled.push(handle);
    }
}

/// A ledger that keeps totals in memory and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    pub commits: Vec<(ResourceKey, u64)>,
    pub daily: BTreeMap<(NaiveDate, ResourceKey), u64>,
    pub fail: bool,
}

impl MemoryLedger {
    pub fn seconds_for(&self, resource: &str) -> u64 {
        self.commits
            .iter()
            .filter(|(key, _)| key.as_str() == resource)
            .map(|(_, seconds)| seconds)
            .sum()
    }

    pub fn committed(&self) -> Vec<(&str, u64)> {
        self.commits
            .iter()
            .map(|(key, seconds)| (key.as_str(), *seconds))
            .collect()
    }
}

impl Ledger for MemoryLedger {
    fn commit(
        &mut self,
        resource: &ResourceKey,
        seconds: u64,
        at: DateTime<Local>,
    ) -> Result<CommitReceipt, LedgerError> {
        if self.fail {
            return Err(LedgerError("disk full".into()));
        }
        let day = at.date_naive();
        let total = self.daily.entry((day, resource.clone())).or_default();
        let previous_total = *total;
        *total += seconds;
        self.commits.push((resource.clone(), seconds));
        Ok(CommitReceipt {
            day,
            hour: chrono::Timelike::hour(&at),
            previous_total,
            new_total: *total,
        })
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Vec<Notification>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.sent.push(notification);
    }
}
