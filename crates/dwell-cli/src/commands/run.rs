//! The tracking daemon.
//!
//! Reads host events and control requests as JSON lines on stdin and writes
//! replies and notifications as JSON lines on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use chrono::Local;
use dwell_core::Tracker;
use dwell_db::Database;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};

use crate::Config;
use crate::host::{Outbox, TokioScheduler};
use crate::service::{Outgoing, handle_line};

type DaemonTracker = Tracker<TokioScheduler, Database, Outbox>;

/// Runs the daemon until stdin closes or Ctrl-C.
pub fn run(db: Database, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(serve(db, config))
}

async fn serve(mut db: Database, config: &Config) -> Result<()> {
    let settings = db.load_settings().context("failed to load settings")?;
    let today = Local::now().date_naive();
    if let Err(err) = db.prune(settings.retention_days, today) {
        tracing::warn!(error = %err, "retention pruning failed");
    }

    let mut tracker: DaemonTracker =
        Tracker::new(settings, TokioScheduler::default(), db, Outbox::default());
    tracing::info!(database = %config.database_path.display(), "tracker started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let mut poll = tokio::time::interval(config.activity_poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let deadline = tracker.scheduler().next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                if let Some(reply) = handle_line(&mut tracker, &line) {
                    write_line(&mut stdout, &reply).await?;
                }
            }
            () = sleep_until(deadline) => {
                for handle in tracker.scheduler_mut().pop_due(Instant::now()) {
                    tracker.on_expire(handle);
                }
            }
            _ = poll.tick() => tracker.poll_activity(),
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                tracing::debug!("interrupted");
                break;
            }
        }
        flush_notifications(&mut tracker, &mut stdout).await?;
    }

    tracker.shutdown();
    flush_notifications(&mut tracker, &mut stdout).await?;
    tracing::info!("tracker stopped");
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn flush_notifications(
    tracker: &mut DaemonTracker,
    stdout: &mut tokio::io::Stdout,
) -> Result<()> {
    for notification in tracker.notifier_mut().drain() {
        write_line(stdout, &Outgoing::Notification { notification }).await?;
    }
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, message: &Outgoing) -> Result<()> {
    let mut line = serde_json::to_vec(message).context("failed to encode message")?;
    line.push(b'\n');
    stdout
        .write_all(&line)
        .await
        .context("failed to write stdout")?;
    stdout.flush().await.context("failed to flush stdout")?;
    Ok(())
}
