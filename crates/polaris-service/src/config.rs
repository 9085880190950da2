//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection endpoint settings.
    pub uplink: UplinkConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Upload schedule.
    pub sync: SyncConfig,
    /// Collector behaviour.
    pub collector: CollectorConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// ```
    /// use polaris_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.uplink.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.sync.validate());
        errors.extend(self.collector.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Collection endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    /// Base URL of the collection server (e.g., "http://192.168.1.10:3000").
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl UplinkConfig {
    /// Full URL the logs are posted to.
    pub fn submit_url(&self) -> String {
        format!(
            "{}{}",
            self.endpoint.trim_end_matches('/'),
            polaris_types::wire::SUBMIT_LOGS_PATH
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate uplink configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.endpoint.is_empty() {
            errors.push(ValidationError {
                field: "uplink.endpoint".to_string(),
                message: "endpoint cannot be empty".to_string(),
            });
        } else if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "uplink.endpoint".to_string(),
                message: format!(
                    "invalid endpoint '{}': must start with http:// or https://",
                    self.endpoint
                ),
            });
        }

        if self.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "uplink.timeout_secs".to_string(),
                message: "timeout cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: polaris_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Minimum sync interval in seconds.
pub const MIN_SYNC_INTERVAL: u64 = 1;
/// Maximum sync interval in seconds (1 hour).
pub const MAX_SYNC_INTERVAL: u64 = 3600;

/// Upload schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between upload cycles. Also the retry interval after a failure.
    pub interval_secs: u64,
    /// Maximum number of records per upload. Unset uploads everything pending.
    pub batch_limit: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            batch_limit: None,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate sync configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_secs < MIN_SYNC_INTERVAL {
            errors.push(ValidationError {
                field: "sync.interval_secs".to_string(),
                message: format!(
                    "sync interval {} is too short (minimum {} second)",
                    self.interval_secs, MIN_SYNC_INTERVAL
                ),
            });
        } else if self.interval_secs > MAX_SYNC_INTERVAL {
            errors.push(ValidationError {
                field: "sync.interval_secs".to_string(),
                message: format!(
                    "sync interval {} is too long (maximum {} seconds / 1 hour)",
                    self.interval_secs, MAX_SYNC_INTERVAL
                ),
            });
        }

        if self.batch_limit == Some(0) {
            errors.push(ValidationError {
                field: "sync.batch_limit".to_string(),
                message: "batch limit cannot be 0 (omit it to upload everything)".to_string(),
            });
        }

        errors
    }
}

/// Collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Withhold all records until the first location fix arrives.
    ///
    /// When false, records observed before any fix are stored without a location.
    pub require_location_fix: bool,
    /// Capacity of the host event queue.
    pub event_buffer: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            require_location_fix: false,
            event_buffer: 256,
        }
    }
}

impl CollectorConfig {
    /// Validate collector configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.event_buffer == 0 {
            errors.push(ValidationError {
                field: "collector.event_buffer".to_string(),
                message: "event buffer cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `sync.interval_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("polaris")
        .join("service.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.uplink.endpoint, "http://127.0.0.1:3000");
        assert_eq!(config.sync.interval_secs, 10);
        assert_eq!(config.sync.batch_limit, None);
        assert!(!config.collector.require_location_fix);
        assert_eq!(config.storage.path, polaris_store::default_db_path());
    }

    #[test]
    fn test_submit_url() {
        let mut uplink = UplinkConfig::default();
        assert_eq!(
            uplink.submit_url(),
            "http://127.0.0.1:3000/api/v1/panel/submitLogs"
        );

        uplink.endpoint = "https://collector.example.com/".to_string();
        assert_eq!(
            uplink.submit_url(),
            "https://collector.example.com/api/v1/panel/submitLogs"
        );
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [uplink]
            endpoint = "http://192.168.1.10:3000"
            timeout_secs = 5

            [storage]
            path = "/data/polaris.db"

            [sync]
            interval_secs = 60
            batch_limit = 200

            [collector]
            require_location_fix = true
            event_buffer = 32
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.uplink.endpoint, "http://192.168.1.10:3000");
        assert_eq!(config.uplink.timeout(), Duration::from_secs(5));
        assert_eq!(config.storage.path, PathBuf::from("/data/polaris.db"));
        assert_eq!(config.sync.interval(), Duration::from_secs(60));
        assert_eq!(config.sync.batch_limit, Some(200));
        assert!(config.collector.require_location_fix);
        assert_eq!(config.collector.event_buffer, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[sync]\ninterval_secs = 60\n").unwrap();
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.uplink.timeout_secs, 30);
        assert_eq!(config.collector.event_buffer, 256);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("service.toml");

        let mut config = Config::default();
        config.uplink.endpoint = "http://10.0.0.1:3000".to_string();
        config.storage.path = PathBuf::from("/tmp/test.db");
        config.sync.batch_limit = Some(50);

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.uplink.endpoint, "http://10.0.0.1:3000");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.sync.batch_limit, Some(50));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_validated_rejects_bad_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[sync]\ninterval_secs = 0\n").unwrap();

        let result = Config::load_validated(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("polaris/service.toml"));
    }

    // ==========================================================================
    // Validation tests
    // ==========================================================================

    #[test]
    fn test_uplink_validation() {
        assert!(UplinkConfig::default().validate().is_empty());

        let empty = UplinkConfig {
            endpoint: String::new(),
            ..Default::default()
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        let no_scheme = UplinkConfig {
            endpoint: "192.168.1.10:3000".to_string(),
            ..Default::default()
        };
        let errors = no_scheme.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("http://"));

        let zero_timeout = UplinkConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        let errors = zero_timeout.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "uplink.timeout_secs");
    }

    #[test]
    fn test_storage_path_validation() {
        let empty = StorageConfig {
            path: PathBuf::new(),
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));
    }

    #[test]
    fn test_sync_interval_validation() {
        let too_short = SyncConfig {
            interval_secs: 0,
            batch_limit: None,
        };
        let errors = too_short.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too short"));

        let too_long = SyncConfig {
            interval_secs: 7200,
            batch_limit: None,
        };
        let errors = too_long.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too long"));

        let zero_batch = SyncConfig {
            interval_secs: 10,
            batch_limit: Some(0),
        };
        let errors = zero_batch.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync.batch_limit");
    }

    #[test]
    fn test_collector_validation() {
        let zero_buffer = CollectorConfig {
            require_location_fix: false,
            event_buffer: 0,
        };
        assert_eq!(zero_buffer.validate().len(), 1);
    }

    #[test]
    fn test_config_validation_collects_all_errors() {
        let mut config = Config::default();
        config.uplink.endpoint = String::new();
        config.sync.interval_secs = 0;

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);

        let display = ConfigError::Validation(errors).to_string();
        assert!(display.contains("uplink.endpoint"));
        assert!(display.contains("sync.interval_secs"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError {
            field: "sync.interval_secs".to_string(),
            message: "too short".to_string(),
        };
        assert_eq!(format!("{}", error), "sync.interval_secs: too short");
    }
}
