//! Global configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

static DEFAULT_SYNC_INTERVAL: &str = "15m";

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rentcal")
}

fn default_port() -> u16 {
    8080
}

fn default_sync_interval() -> String {
    DEFAULT_SYNC_INTERVAL.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_vanish_threshold() -> u32 {
    1
}

/// Global configuration at ~/.config/rentcal/config.toml
///
/// Source-specific settings (feed URL, per-source interval and vanish
/// threshold) live on the source records themselves.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Minimum time between request-triggered sync batches, as a
    /// humantime string (e.g. "15m", "1h").
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Consecutive misses before a vanished booking is soft-deleted.
    /// 1 means the first missed run tombstones the booking.
    #[serde(default = "default_vanish_threshold")]
    pub vanish_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            port: default_port(),
            sync_interval: default_sync_interval(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            vanish_threshold: default_vanish_threshold(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("rentcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file if present, falling back to defaults.
    pub fn load() -> Result<Config> {
        let path = Config::config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// The batch interval as a duration. Unparseable values fall back to
    /// the default rather than disabling auto-sync.
    pub fn sync_interval(&self) -> Duration {
        humantime::parse_duration(&self.sync_interval).unwrap_or_else(|_| {
            humantime::parse_duration(DEFAULT_SYNC_INTERVAL).expect("default interval parses")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.vanish_threshold, 1);
        assert_eq!(config.sync_interval(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_interval_parses_humantime_strings() {
        let config: Config = toml::from_str(r#"sync_interval = "1h 30m""#).unwrap();
        assert_eq!(config.sync_interval(), Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_garbage_interval_falls_back_to_default() {
        let config: Config = toml::from_str(r#"sync_interval = "soon""#).unwrap();
        assert_eq!(config.sync_interval(), Duration::from_secs(15 * 60));
    }
}
