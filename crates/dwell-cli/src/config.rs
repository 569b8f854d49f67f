//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Default cadence of the built-in idle detector.
pub const DEFAULT_ACTIVITY_POLL_SECONDS: u64 = 30;

/// Process configuration.
///
/// Tracking settings (interval, limits, retention) live in the database, not
/// here; see `dwell settings`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// How often the daemon polls idle detectors.
    pub activity_poll_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("activity_poll_seconds", &self.activity_poll_seconds)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("dwell.db"),
            activity_poll_seconds: DEFAULT_ACTIVITY_POLL_SECONDS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // DWELL_DATABASE_PATH, DWELL_ACTIVITY_POLL_SECONDS
        figment = figment.merge(Env::prefixed("DWELL_"));

        figment.extract()
    }

    /// Poll cadence, never below one second.
    pub fn activity_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.activity_poll_seconds.max(1))
    }
}

/// Returns the platform-specific config directory for dwell.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dwell"))
}

/// Returns the platform-specific data directory for dwell.
///
/// On Linux: `~/.local/share/dwell`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("dwell"))
}
