//! Control-plane dispatch and the daemon's JSON-lines protocol.

use anyhow::{Context, Result};
use dwell_core::{
    Clock, HostEvent, Notification, Notifier, Request, Response, Scheduler, Tracker, parse_day,
    parse_day_range, render_csv,
};
use dwell_db::Database;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A control request line: `{"request": {...}, "id": 7}`.
#[derive(Debug, Deserialize)]
struct RequestLine {
    request: Request,
    #[serde(default)]
    id: Value,
}

/// A line written to stdout.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Reply {
        id: Value,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Response>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Notification {
        notification: Notification,
    },
}

impl Outgoing {
    fn reply(id: Value, result: Result<Response>) -> Self {
        match result {
            Ok(response) => Self::Reply {
                id,
                ok: true,
                response: Some(response),
                error: None,
            },
            Err(err) => Self::Reply {
                id,
                ok: false,
                response: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

/// Applies one input line. Returns the reply to write, if any.
///
/// Host events produce no reply unless they are malformed.
pub fn handle_line<S, N, C>(tracker: &mut Tracker<S, Database, N, C>, line: &str) -> Option<Outgoing>
where
    S: Scheduler,
    N: Notifier,
    C: Clock,
{
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed line");
            return Some(Outgoing::reply(Value::Null, Err(err).context("invalid JSON")));
        }
    };

    if value.get("request").is_some() {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let parsed: RequestLine = match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Some(Outgoing::reply(id, Err(err).context("invalid request")));
            }
        };
        tracing::debug!(request = ?parsed.request, "control request");
        let result = dispatch(tracker, parsed.request);
        return Some(Outgoing::reply(parsed.id, result));
    }

    match serde_json::from_value::<HostEvent>(value) {
        Ok(event) => {
            tracker.handle(event);
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "ignoring invalid event");
            Some(Outgoing::reply(Value::Null, Err(err).context("invalid event")))
        }
    }
}

/// Executes a control request against the tracker and its store.
///
/// Invalid input is rejected before any state changes. Settings are persisted
/// after every successful change; a failed read of statistics yields empty
/// statistics rather than an error.
pub fn dispatch<S, N, C>(tracker: &mut Tracker<S, Database, N, C>, request: Request) -> Result<Response>
where
    S: Scheduler,
    N: Notifier,
    C: Clock,
{
    let response = match request {
        Request::ToggleTracking { enabled } => {
            let status = tracker.toggle_tracking(enabled);
            persist_settings(tracker);
            Response::Tracking { status }
        }
        Request::GetStatus => Response::Status(tracker.status()),
        Request::SetReminderInterval { seconds } => {
            let interval = tracker.set_reminder_interval(seconds)?;
            persist_settings(tracker);
            Response::Interval { interval }
        }
        Request::SendTestReminder => {
            tracker.send_test_reminder();
            Response::Done {}
        }
        Request::GetStatsForDay { date } => {
            let day = parse_day(&date)?;
            Response::Stats(stats_or_empty(tracker.ledger(), day))
        }
        Request::GetStatsToday => {
            let today = tracker.now().date_naive();
            Response::Stats(stats_or_empty(tracker.ledger(), today))
        }
        Request::UpdateActivitySettings {
            track_inactive_time,
            threshold_minutes,
        } => {
            tracker.update_activity_settings(track_inactive_time, threshold_minutes)?;
            persist_settings(tracker);
            Response::Done {}
        }
        Request::UpdateTimeLimits { limits, enabled } => {
            tracker.update_time_limits(&limits, enabled)?;
            persist_settings(tracker);
            Response::Done {}
        }
        Request::UpdateRetention { days, cleanup_now } => {
            tracker.update_retention(days)?;
            persist_settings(tracker);
            let pruned_days = if cleanup_now {
                let today = tracker.now().date_naive();
                Some(
                    tracker
                        .ledger_mut()
                        .prune(days, today)
                        .context("failed to prune statistics")?,
                )
            } else {
                None
            };
            Response::Retention { days, pruned_days }
        }
        Request::ExportRange {
            start_date,
            end_date,
        } => {
            let (start, end) = parse_day_range(&start_date, &end_date)?;
            let stats = tracker.ledger().read_range(start, end).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "failed to read statistics for export");
                dwell_core::RangeStats::new()
            });
            Response::Csv {
                csv: render_csv(&stats),
            }
        }
        Request::ClearAllData => {
            tracker
                .ledger_mut()
                .clear_all()
                .context("failed to clear statistics")?;
            tracker.reset_limit_alerts();
            Response::Done {}
        }
    };
    Ok(response)
}

fn stats_or_empty(db: &Database, day: chrono::NaiveDate) -> dwell_core::DayStats {
    db.stats_for_day(day).unwrap_or_else(|err| {
        tracing::warn!(error = %err, %day, "failed to read statistics");
        dwell_core::DayStats::default()
    })
}

fn persist_settings<S, N, C>(tracker: &mut Tracker<S, Database, N, C>)
where
    S: Scheduler,
    N: Notifier,
    C: Clock,
{
    let settings = tracker.settings().clone();
    if let Err(err) = tracker.ledger_mut().save_settings(&settings) {
        tracing::warn!(error = %err, "failed to save settings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Local;
    use dwell_core::{Ledger, ResourceKey, Settings, SubjectId};

    use crate::host::{Outbox, TokioScheduler};

    type DaemonTracker = Tracker<TokioScheduler, Database, Outbox>;

    fn tracker() -> DaemonTracker {
        let mut db = Database::open_in_memory().unwrap();
        let settings = db.load_settings().unwrap();
        Tracker::new(settings, TokioScheduler::default(), db, Outbox::default())
    }

    fn reply_json(tracker: &mut DaemonTracker, line: &str) -> Value {
        let reply = handle_line(tracker, line).expect("reply");
        serde_json::to_value(reply).unwrap()
    }

    #[test]
    fn events_produce_no_reply() {
        let mut tracker = tracker();
        let reply = handle_line(
            &mut tracker,
            r#"{"event":"tabActivated","subject":3,"url":"https://docs.rs/"}"#,
        );
        assert!(reply.is_none());
        assert_eq!(tracker.state().focus_target(), Some(SubjectId::new(3)));
        assert_eq!(tracker.scheduler().len(), 1);
    }

    #[test]
    fn status_request_echoes_id() {
        let mut tracker = tracker();
        handle_line(
            &mut tracker,
            r#"{"event":"tabActivated","subject":3,"url":"https://docs.rs/"}"#,
        );
        let reply = reply_json(&mut tracker, r#"{"request":{"action":"getStatus"},"id":7}"#);

        assert_eq!(reply["id"], 7);
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["response"]["currentSubject"], 3);
        assert_eq!(reply["response"]["currentResource"], "docs.rs");
        assert_eq!(reply["response"]["intervalSeconds"], 600);
        assert_eq!(reply["response"]["timing"], true);
    }

    #[test]
    fn invalid_requests_report_errors_without_changes() {
        let mut tracker = tracker();
        let reply = reply_json(
            &mut tracker,
            r#"{"request":{"action":"setReminderInterval","seconds":0},"id":"a"}"#,
        );
        assert_eq!(reply["id"], "a");
        assert_eq!(reply["ok"], false);
        assert_eq!(
            reply["error"],
            "reminder interval seconds must be at least 1, got 0"
        );
        assert_eq!(tracker.settings().reminder_interval_seconds, 600);

        let reply = reply_json(
            &mut tracker,
            r#"{"request":{"action":"getStatsForDay","date":"soon"},"id":2}"#,
        );
        assert_eq!(reply["ok"], false);

        let reply = reply_json(&mut tracker, r#"{"request":{"action":"launch"},"id":3}"#);
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["ok"], false);
    }

    #[test]
    fn oversized_durations_are_rejected_and_timing_continues() {
        let mut tracker = tracker();
        handle_line(
            &mut tracker,
            r#"{"event":"tabActivated","subject":3,"url":"https://docs.rs/"}"#,
        );

        let reply = reply_json(
            &mut tracker,
            r#"{"request":{"action":"setReminderInterval","seconds":18446744073709551615},"id":1}"#,
        );
        assert_eq!(reply["ok"], false);
        assert_eq!(
            reply["error"],
            "reminder interval seconds must be at most 86400, got 18446744073709551615"
        );
        assert_eq!(tracker.settings().reminder_interval_seconds, 600);

        let reply = reply_json(
            &mut tracker,
            r#"{"request":{"action":"updateActivitySettings","trackInactiveTime":false,"thresholdMinutes":18446744073709551615},"id":2}"#,
        );
        assert_eq!(reply["ok"], false);
        assert_eq!(tracker.settings().inactivity_threshold_seconds, 300);

        assert!(handle_line(&mut tracker, r#"{"event":"userInput","subject":3}"#).is_none());
        let reply = reply_json(&mut tracker, r#"{"request":{"action":"getStatus"},"id":3}"#);
        assert_eq!(reply["response"]["timing"], true);
        assert_eq!(tracker.scheduler().len(), 1);
    }

    #[test]
    fn malformed_lines_get_error_replies() {
        let mut tracker = tracker();
        let reply = reply_json(&mut tracker, "not json");
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["id"], Value::Null);

        let reply = reply_json(&mut tracker, r#"{"event":"tabActivated"}"#);
        assert_eq!(reply["ok"], false);

        assert!(handle_line(&mut tracker, "   ").is_none());
    }

    #[test]
    fn settings_changes_are_persisted() {
        let mut tracker = tracker();
        dispatch(&mut tracker, Request::SetReminderInterval { seconds: 300 }).unwrap();
        dispatch(
            &mut tracker,
            Request::UpdateActivitySettings {
                track_inactive_time: true,
                threshold_minutes: 10,
            },
        )
        .unwrap();
        dispatch(&mut tracker, Request::ToggleTracking { enabled: false }).unwrap();

        let stored = tracker.ledger_mut().load_settings().unwrap();
        assert_eq!(stored.reminder_interval_seconds, 300);
        assert!(stored.track_inactive_time);
        assert_eq!(stored.inactivity_threshold_seconds, 600);
        assert!(!stored.enabled);
    }

    #[test]
    fn stats_and_export_read_the_store() {
        let mut tracker = tracker();
        let now = Local::now();
        let key = ResourceKey::new("example.com").unwrap();
        tracker.ledger_mut().commit(&key, 90, now).unwrap();

        let Response::Stats(stats) = dispatch(&mut tracker, Request::GetStatsToday).unwrap() else {
            panic!("expected stats");
        };
        assert_eq!(stats.daily.get(&key), Some(&90));

        let day = now.format("%Y-%m-%d").to_string();
        let Response::Csv { csv } = dispatch(
            &mut tracker,
            Request::ExportRange {
                start_date: day.clone(),
                end_date: day.clone(),
            },
        )
        .unwrap() else {
            panic!("expected csv");
        };
        assert!(csv.contains(&format!("{day},example.com,1.5,90,,1")));
    }

    #[test]
    fn inverted_export_range_is_rejected() {
        let mut tracker = tracker();
        let err = dispatch(
            &mut tracker,
            Request::ExportRange {
                start_date: "2025-02-01".to_string(),
                end_date: "2025-01-01".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("after end date"));
    }

    #[test]
    fn clear_all_data_empties_store() {
        let mut tracker = tracker();
        let key = ResourceKey::new("a.com").unwrap();
        tracker.ledger_mut().commit(&key, 60, Local::now()).unwrap();

        dispatch(&mut tracker, Request::ClearAllData).unwrap();
        assert_eq!(tracker.ledger().summary().unwrap().days, 0);
    }

    #[test]
    fn retention_update_can_prune() {
        let mut tracker = tracker();
        let response = dispatch(
            &mut tracker,
            Request::UpdateRetention {
                days: 7,
                cleanup_now: true,
            },
        )
        .unwrap();
        assert_eq!(
            response,
            Response::Retention {
                days: 7,
                pruned_days: Some(0)
            }
        );
        assert_eq!(tracker.settings().retention_days, 7);
        assert_eq!(
            tracker.ledger_mut().load_settings().unwrap(),
            Settings {
                retention_days: 7,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn test_reminder_is_queued() {
        let mut tracker = tracker();
        dispatch(&mut tracker, Request::SendTestReminder).unwrap();
        let sent = tracker.notifier_mut().drain();
        assert_eq!(sent, vec![Notification::test()]);
    }
}
