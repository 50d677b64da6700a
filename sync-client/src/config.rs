//! Configuration loading for the engine.
//!
//! Configuration is read once from a TOML file and turned into a
//! [`SchedulePolicy`]. Every field has a default, so an empty file (or no
//! file at all) gives the stock behaviour.

use peersync_core::policy::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_WAIT, DEFAULT_SLOT_BOUND, DEFAULT_STABILITY_WINDOW,
};
use peersync_core::SchedulePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executor timing and limits.
    pub executor: ExecutorConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Quiet time before a change is executed (default: 2000).
    pub stability_window_ms: u64,
    /// Minimum re-queue delay (default: 500).
    pub min_wait_ms: u64,
    /// Maximum concurrently executing actions (default: 10).
    pub max_in_flight: usize,
    /// Retries per dispatch after the first failure (default: 5).
    pub max_attempts: u32,
    /// Keep a slot reserved until the transfer completes (default: true).
    pub wait_for_completion: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG` (default: "info").
    pub filter: String,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: millis(DEFAULT_STABILITY_WINDOW),
            min_wait_ms: millis(DEFAULT_MIN_WAIT),
            max_in_flight: DEFAULT_SLOT_BOUND,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_for_completion: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Build the schedule policy these settings describe.
    pub fn policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            stability_window: Duration::from_millis(self.stability_window_ms),
            min_wait: Duration::from_millis(self.min_wait_ms),
            slot_bound: self.max_in_flight,
            max_attempts: self.max_attempts,
            wait_for_completion: self.wait_for_completion,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the executor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                field: "executor.max_in_flight",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Schedule policy for the executor.
    pub fn policy(&self) -> SchedulePolicy {
        self.executor.policy()
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Failed to render configuration.
    #[error("failed to render config: {0}")]
    SerializeError(#[source] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.executor.stability_window_ms, 2000);
        assert_eq!(config.executor.max_in_flight, 10);
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
        assert_eq!(config.policy(), SchedulePolicy::default());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[executor]
stability_window_ms = 100
max_in_flight = 1
wait_for_completion = false

[logging]
filter = "peersync=debug"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        let policy = config.policy();
        assert_eq!(policy.stability_window, Duration::from_millis(100));
        assert_eq!(policy.slot_bound, 1);
        assert_eq!(policy.min_wait, Duration::from_millis(500));
        assert!(!policy.wait_for_completion);
        assert_eq!(config.logging.filter, "peersync=debug");
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor]\nmax_attempts = 2").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.executor.max_attempts, 2);
    }

    #[test]
    fn zero_slots_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor]\nmax_in_flight = 0").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "executor.max_in_flight",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::from_file(Path::new("/nonexistent/peersync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor\nmax_attempts = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn renders_back_to_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("stability_window_ms = 2000"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
