//! Configuration for tidings.
//!
//! Read from `~/.config/tidings/config.toml` at startup. If the file doesn't
//! exist, a default configuration with comments is written first. Missing
//! fields fall back to their defaults.

pub mod interval;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::DEFAULT_REFRESH_INTERVAL;
use crate::engine::{EngineConfig, DEFAULT_WORKERS};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub headline: HeadlineSection,
    pub notifier: NotifierSection,
    pub storage: StorageSection,
}

/// `[engine]`: tick cadence, backoff and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub tick_interval_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_secs: u64,
    pub workers: usize,
    pub fetch_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            backoff_base_ms: 1000,
            backoff_max_secs: 60,
            workers: DEFAULT_WORKERS,
            fetch_timeout_secs: EngineConfig::default().fetch_timeout.as_secs(),
            delivery_timeout_secs: EngineConfig::default().delivery_timeout.as_secs(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_secs(self.tick_interval_secs.max(1)),
            backoff_base: Duration::from_millis(self.backoff_base_ms.max(1)),
            backoff_max: Duration::from_secs(self.backoff_max_secs.max(1)),
            workers: self.workers.max(1),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs.max(1)),
        }
    }
}

/// `[headline]`: the single source served by `tidings latest`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeadlineSection {
    pub url: Option<String>,
    pub refresh_secs: u64,
}

impl Default for HeadlineSection {
    fn default() -> Self {
        Self {
            url: None,
            refresh_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
        }
    }
}

/// `[notifier]`: where notifications go. Without a webhook they are printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path, creating it if missing.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/tidings/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tidings").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# tidings configuration

[engine]
# Pause between two passes over all subscriptions
tick_interval_secs = 5

# Backoff after a failed pass: starts here, doubles, stops at the max
backoff_base_ms = 1000
backoff_max_secs = 60

# Subscriptions processed concurrently within one pass
workers = 10

# Upper bounds for one feed download and one notification
fetch_timeout_secs = 10
delivery_timeout_secs = 10

[headline]
# Feed shown by `tidings latest` (uncomment to enable)
# url = "https://techcrunch.com/feed/"

# Minimum seconds between two downloads of the headline feed
refresh_secs = 5

[notifier]
# POST each notification as JSON to this endpoint.
# Without it, notifications are printed to stdout.
# webhook_url = "http://127.0.0.1:8080/notify"

[storage]
# SQLite database file (default: <data dir>/tidings/tidings.db)
# database = "/var/lib/tidings/tidings.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
