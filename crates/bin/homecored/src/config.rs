//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `homecore.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use homecore_app::hub::HubOptions;
use homecore_domain::config::HubConfig;
use serde::Deserialize;

const CONFIG_FILE: &str = "homecore.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location, units and paths of the hub.
    pub hub: HubConfig,
    /// Worker pool and timer tuning.
    pub runtime: RuntimeConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Seconds between two `time_changed` events.
    pub timer_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo integration.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `homecore.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(workers) = lookup("HOMECORE_WORKERS").and_then(|v| v.parse().ok()) {
            self.runtime.workers = workers;
        }
        if let Some(secs) = lookup("HOMECORE_TIMER_INTERVAL").and_then(|v| v.parse().ok()) {
            self.runtime.timer_interval_secs = secs;
        }
        if let Some(filter) = lookup("HOMECORE_LOG") {
            self.logging.filter = filter;
        }
        if let Some(filter) = lookup("RUST_LOG") {
            self.logging.filter = filter;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.workers == 0 {
            return Err(ConfigError::Validation(
                "runtime.workers must be non-zero".to_string(),
            ));
        }
        if self.runtime.timer_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "runtime.timer_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Runtime options handed to [`homecore_app::hub::Hub::new`].
    #[must_use]
    pub fn hub_options(&self) -> HubOptions {
        HubOptions {
            workers: self.runtime.workers,
            timer_interval: Duration::from_secs(self.runtime.timer_interval_secs),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let defaults = HubOptions::default();
        Self {
            workers: defaults.workers,
            timer_interval_secs: defaults.timer_interval.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homecored=info,homecore_app=info,homecore_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
