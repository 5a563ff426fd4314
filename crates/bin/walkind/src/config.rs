//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `walkin.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;
use walkin_app::services::ServiceOptions;
use walkin_domain::queue::{DEFAULT_LATE_CLIENT_CAP_MINUTES, DEFAULT_MAX_SIZE, QueueSettings};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Late-customer sweeper settings.
    pub scheduler: SchedulerConfig,
    /// Defaults and tunables for queue services.
    pub queue: QueueConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between two late-customer sweeps.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Extra attempts after a concurrent modification.
    pub conflict_retries: u32,
    /// `max_size` for queues opened without explicit settings.
    pub default_max_size: u32,
    /// Late-client cap for queues opened without explicit settings.
    pub default_late_client_cap_minutes: u32,
    /// Service time assumed before a queue has completed any entry.
    pub default_service_minutes: u32,
}

impl Config {
    /// Load configuration from `walkin.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("walkin.toml")?;
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

    /// Apply overrides looked up by variable name. Unparsable numbers are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("WALKIN_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("WALKIN_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(secs) = lookup("WALKIN_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.scheduler.sweep_interval_secs = secs;
        }
        if let Some(retries) = lookup("WALKIN_CONFLICT_RETRIES").and_then(|v| v.parse().ok()) {
            self.queue.conflict_retries = retries;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.queue.conflict_retries == 0 {
            return Err(ConfigError::Validation(
                "conflict_retries must be non-zero".to_string(),
            ));
        }
        if self.queue.default_max_size == 0 {
            return Err(ConfigError::Validation(
                "default_max_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.sweep_interval_secs)
    }

    /// Options handed to the queue service.
    #[must_use]
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            conflict_retries: self.queue.conflict_retries,
            default_settings: QueueSettings {
                max_size: self.queue.default_max_size,
                late_client_cap_minutes: self.queue.default_late_client_cap_minutes,
            },
            default_service_minutes: self.queue.default_service_minutes,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:walkin.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "walkind=info,walkin_app=info,walkin_adapter_storage_sqlite_sqlx=info"
                .to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        let service = ServiceOptions::default();
        Self {
            conflict_retries: service.conflict_retries,
            default_max_size: DEFAULT_MAX_SIZE,
            default_late_client_cap_minutes: DEFAULT_LATE_CLIENT_CAP_MINUTES,
            default_service_minutes: service.default_service_minutes,
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
