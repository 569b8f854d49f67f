//! Integration tests for the stdin/stdout daemon and the offline commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::TempDir;

fn dwell_binary() -> String {
    env!("CARGO_BIN_EXE_dwell").to_string()
}

/// Writes a config file pointing at a database inside the temp directory.
fn write_config(temp: &Path) -> PathBuf {
    let db_path = temp.join("data").join("dwell.db");
    let config_path = temp.join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "database_path = {:?}\nactivity_poll_seconds = 3600\n",
            db_path.display().to_string()
        ),
    )
    .unwrap();
    config_path
}

fn dwell(temp: &Path, config: &Path, args: &[&str]) -> Output {
    Command::new(dwell_binary())
        .env("XDG_CONFIG_HOME", temp)
        .env("HOME", temp)
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run dwell")
}

/// Runs the daemon with the given input lines and returns its stdout lines.
fn run_daemon(temp: &Path, config: &Path, lines: &[&str]) -> Vec<Value> {
    let mut child = Command::new(dwell_binary())
        .env("XDG_CONFIG_HOME", temp)
        .env("HOME", temp)
        .arg("--config")
        .arg(config)
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn dwell run");

    {
        let mut stdin = child.stdin.take().unwrap();
        for line in lines {
            writeln!(stdin, "{line}").unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "dwell run should exit cleanly: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn reply(messages: &[Value], id: u64) -> &Value {
    messages
        .iter()
        .find(|message| message["id"] == id)
        .unwrap_or_else(|| panic!("no reply with id {id} in {messages:?}"))
}

#[test]
fn test_daemon_reports_status_for_focused_tab() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let messages = run_daemon(
        temp.path(),
        &config,
        &[
            r#"{"event":"tabActivated","subject":7,"url":"https://www.example.com/page"}"#,
            r#"{"request":{"action":"getStatus"},"id":1}"#,
        ],
    );

    let status = reply(&messages, 1);
    assert_eq!(status["ok"], true);
    let response = &status["response"];
    assert_eq!(response["enabled"], true);
    assert_eq!(response["intervalSeconds"], 600);
    assert_eq!(response["currentSubject"], 7);
    assert_eq!(response["currentResource"], "www.example.com");
    assert_eq!(response["timing"], true);
    assert_eq!(response["windowFocused"], true);
}

#[test]
fn test_daemon_sends_test_reminder() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let messages = run_daemon(
        temp.path(),
        &config,
        &[r#"{"request":{"action":"sendTestReminder"},"id":"ping"}"#],
    );

    let ack = messages
        .iter()
        .find(|message| message["id"] == "ping")
        .unwrap();
    assert_eq!(ack["ok"], true);

    let notification = messages
        .iter()
        .find_map(|message| message.get("notification"))
        .expect("test notification should be written");
    assert_eq!(notification["kind"], "test");
    assert_eq!(notification["title"], "Mindful Ping Test");
}

#[test]
fn test_daemon_rejects_bad_input_without_exiting() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let messages = run_daemon(
        temp.path(),
        &config,
        &[
            "not json",
            r#"{"request":{"action":"setReminderInterval","seconds":0},"id":1}"#,
            r#"{"request":{"action":"getStatsForDay","date":"yesterday"},"id":2}"#,
            r#"{"request":{"action":"getStatus"},"id":3}"#,
        ],
    );

    assert_eq!(messages[0]["ok"], false);
    assert!(messages[0]["id"].is_null());
    assert_eq!(reply(&messages, 1)["ok"], false);
    assert_eq!(reply(&messages, 2)["ok"], false);
    assert_eq!(reply(&messages, 3)["response"]["intervalSeconds"], 600);
}

#[test]
fn test_daemon_persists_settings_for_offline_commands() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let messages = run_daemon(
        temp.path(),
        &config,
        &[
            r#"{"request":{"action":"setReminderInterval","seconds":900},"id":1}"#,
            r#"{"request":{"action":"toggleTracking","enabled":false},"id":2}"#,
        ],
    );
    assert_eq!(reply(&messages, 1)["response"]["interval"], 900);
    assert_eq!(reply(&messages, 2)["response"]["status"], "disabled");

    let output = dwell(temp.path(), &config, &["settings", "show"]);
    assert!(output.status.success());
    let settings: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["reminderIntervalSeconds"], 900);
    assert_eq!(settings["enabled"], false);

    let output = dwell(temp.path(), &config, &["status"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tracking: disabled"), "{stdout}");
    assert!(stdout.contains("Reminder interval: 15m"), "{stdout}");
}

#[test]
fn test_offline_commands_on_empty_database() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = dwell(temp.path(), &config, &["report", "--date", "2025-01-29"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("DWELL REPORT: Wednesday, Jan 29, 2025"));
    assert!(stdout.contains("No time recorded this day."));

    let output = dwell(
        temp.path(),
        &config,
        &["export", "--start", "2025-01-01", "--end", "2025-01-31"],
    );
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Date,Resource,TimeSpent(min),TimeSpent(sec),Hour,SessionCount\n"
    );

    let output = dwell(temp.path(), &config, &["clear"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--yes"));

    let output = dwell(temp.path(), &config, &["clear", "--yes"]);
    assert!(output.status.success());
}
