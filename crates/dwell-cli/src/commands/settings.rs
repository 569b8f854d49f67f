//! Viewing and changing tracking settings offline.
//!
//! A running daemon reads settings at startup only; changes made here apply
//! the next time it starts.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result, bail};

use dwell_core::{ResourceKey, Settings};
use dwell_db::Database;

use crate::SettingsAction;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &SettingsAction) -> Result<()> {
    let mut settings = db.load_settings().context("failed to load settings")?;

    if apply(&mut settings, action)? {
        db.save_settings(&settings)
            .context("failed to save settings")?;
        tracing::debug!(?action, "settings updated");
    }

    writeln!(writer, "{}", serde_json::to_string_pretty(&settings)?)?;
    Ok(())
}

/// Applies an action, returning whether anything needs saving.
fn apply(settings: &mut Settings, action: &SettingsAction) -> Result<bool> {
    match action {
        SettingsAction::Show => return Ok(false),
        SettingsAction::Interval { seconds } => settings.set_reminder_interval(*seconds)?,
        SettingsAction::Activity {
            track_inactive,
            threshold_minutes,
        } => settings.set_activity(*track_inactive, *threshold_minutes)?,
        SettingsAction::Limit {
            domain,
            minutes,
            remove,
        } => {
            let key = ResourceKey::for_limit(domain)?;
            let mut limits: BTreeMap<String, u32> = settings
                .daily_limit_minutes
                .iter()
                .map(|(resource, minutes)| (resource.to_string(), *minutes))
                .collect();
            match (minutes, remove) {
                (Some(minutes), false) => {
                    limits.insert(key.to_string(), *minutes);
                }
                (None, true) => {
                    limits.remove(key.as_str());
                }
                _ => bail!("give either a limit in minutes or --remove for {key}"),
            }
            let enabled = settings.time_limit_enabled;
            settings.set_time_limits(&limits, enabled)?;
        }
        SettingsAction::Limits { state } => settings.time_limit_enabled = state == "on",
        SettingsAction::Retention { days } => settings.set_retention(*days)?,
        SettingsAction::Enable => settings.enabled = true,
        SettingsAction::Disable => settings.enabled = false,
    }
    Ok(true)
}
