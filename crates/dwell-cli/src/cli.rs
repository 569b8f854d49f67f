//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

/// Attention dwell-time tracker.
///
/// Times how long attention stays on each browser tab, attributes it to the
/// tab's domain, and sends mindful-break reminders and daily-limit alerts.
#[derive(Debug, Parser)]
#[command(name = "dwell", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the tracker, reading JSON-lines events and requests from stdin.
    Run,

    /// Show tracking settings and stored statistics.
    Status,

    /// Show time spent per domain for a day.
    Report {
        /// Day to report (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export statistics for a date range as CSV.
    Export {
        /// First day of the range (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Last day of the range (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: String,

        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete statistics older than the retention period.
    Prune {
        /// Days to keep. Defaults to the configured retention.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Delete all statistics. Settings are kept.
    Clear {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },

    /// View or change tracking settings.
    #[command(subcommand)]
    Settings(SettingsAction),
}

/// Settings subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the current settings as JSON.
    Show,

    /// Set the reminder interval.
    Interval {
        /// Interval in seconds.
        seconds: u64,
    },

    /// Configure inactivity handling.
    Activity {
        /// Keep counting time while the user is idle.
        #[arg(long)]
        track_inactive: bool,

        /// Idle minutes before a tab counts as inactive.
        #[arg(long, default_value_t = 5)]
        threshold_minutes: u64,
    },

    /// Set or remove a daily limit for a domain.
    #[command(group(ArgGroup::new("change").required(true).args(["minutes", "remove"])))]
    Limit {
        /// Domain to limit, e.g. youtube.com.
        domain: String,

        /// Daily limit in minutes.
        minutes: Option<u32>,

        /// Remove the limit instead.
        #[arg(long)]
        remove: bool,
    },

    /// Turn daily limit alerts on or off.
    Limits {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },

    /// Set how many days of statistics to keep.
    Retention {
        days: u32,
    },

    /// Enable tracking.
    Enable,

    /// Disable tracking.
    Disable,
}
