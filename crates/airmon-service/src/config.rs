//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use airmon_store::{DEFAULT_CAPACITY, StoreConfig};
use airmon_types::utc_offset_from_minutes;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Sensor polling settings.
    pub sensor: SensorConfig,
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
    /// This checks:
    /// - Storage path is not empty
    /// - The calendar-day offset is a valid UTC offset
    /// - Poll interval is within 1s - 1 hour
    /// - Baseline interval is at most one day
    ///
    /// # Example
    ///
    /// ```
    /// use airmon_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.storage.validate());
        errors.extend(self.sensor.validate());

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

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding snapshots and day archives.
    pub path: PathBuf,
    /// Ring buffer capacity; `0` selects the default.
    pub capacity: usize,
    /// Offset from UTC, in minutes, at which calendar days begin.
    pub utc_offset_minutes: i32,
    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: airmon_store::default_storage_dir(),
            capacity: DEFAULT_CAPACITY,
            utc_offset_minutes: 0,
            pretty: false,
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
                message: "storage path cannot be empty".to_string(),
            });
        }

        if let Err(e) = utc_offset_from_minutes(self.utc_offset_minutes) {
            errors.push(ValidationError {
                field: "storage.utc_offset_minutes".to_string(),
                message: e.to_string(),
            });
        }

        errors
    }

    /// Build the store settings.
    pub fn to_store_config(&self) -> Result<StoreConfig, ConfigError> {
        let offset = utc_offset_from_minutes(self.utc_offset_minutes).map_err(|e| {
            ConfigError::Validation(vec![ValidationError {
                field: "storage.utc_offset_minutes".to_string(),
                message: e.to_string(),
            }])
        })?;

        Ok(StoreConfig::new(&self.path)
            .capacity(self.capacity)
            .utc_offset(offset)
            .pretty(self.pretty))
    }
}

/// Minimum poll interval in seconds.
pub const MIN_POLL_INTERVAL: u64 = 1;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;
/// Maximum baseline readback interval in seconds (1 day).
pub const MAX_BASELINE_INTERVAL: u64 = 24 * 3600;

/// Sensor polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Seconds between samples.
    pub poll_interval: u64,
    /// Seconds between calibration baseline readbacks; `0` disables them.
    pub baseline_interval: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            baseline_interval: 60,
        }
    }
}

impl SensorConfig {
    /// Validate sensor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.poll_interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError {
                field: "sensor.poll_interval".to_string(),
                message: format!(
                    "poll interval {} is too short (minimum {} second)",
                    self.poll_interval, MIN_POLL_INTERVAL
                ),
            });
        } else if self.poll_interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError {
                field: "sensor.poll_interval".to_string(),
                message: format!(
                    "poll interval {} is too long (maximum {} seconds / 1 hour)",
                    self.poll_interval, MAX_POLL_INTERVAL
                ),
            });
        }

        if self.baseline_interval > MAX_BASELINE_INTERVAL {
            errors.push(ValidationError {
                field: "sensor.baseline_interval".to_string(),
                message: format!(
                    "baseline interval {} is too long (maximum {} seconds / 1 day)",
                    self.baseline_interval, MAX_BASELINE_INTERVAL
                ),
            });
        }

        errors
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// `None` when baseline readback is disabled.
    pub fn baseline_period(&self) -> Option<Duration> {
        (self.baseline_interval > 0).then(|| Duration::from_secs(self.baseline_interval))
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
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `sensor.poll_interval`).
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
        .join("airmon")
        .join("service.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.storage.capacity, 2880);
        assert_eq!(config.storage.utc_offset_minutes, 0);
        assert!(!config.storage.pretty);
        assert_eq!(config.sensor.poll_interval, 60);
        assert_eq!(config.sensor.baseline_interval, 60);
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, airmon_store::default_storage_dir());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let toml = r#"
            [sensor]
            poll_interval = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sensor.poll_interval, 5);
        assert_eq!(config.sensor.baseline_interval, 60);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("service.toml");

        let config = Config {
            storage: StorageConfig {
                path: PathBuf::from("/tmp/airmon-test"),
                capacity: 100,
                utc_offset_minutes: -300,
                pretty: true,
            },
            sensor: SensorConfig {
                poll_interval: 30,
                baseline_interval: 0,
            },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Config::load(temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[sensor\npoll_interval = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = Config {
            storage: StorageConfig {
                path: PathBuf::new(),
                utc_offset_minutes: 48 * 60,
                ..StorageConfig::default()
            },
            sensor: SensorConfig {
                poll_interval: 0,
                baseline_interval: MAX_BASELINE_INTERVAL + 1,
            },
        };

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "storage.path",
                        "storage.utc_offset_minutes",
                        "sensor.poll_interval",
                        "sensor.baseline_interval",
                    ]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_poll_interval_bounds() {
        let mut sensor = SensorConfig::default();
        sensor.poll_interval = MIN_POLL_INTERVAL;
        assert!(sensor.validate().is_empty());
        sensor.poll_interval = MAX_POLL_INTERVAL;
        assert!(sensor.validate().is_empty());
        sensor.poll_interval = MAX_POLL_INTERVAL + 1;
        assert_eq!(sensor.validate().len(), 1);
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError {
            field: "sensor.poll_interval".to_string(),
            message: "too short".to_string(),
        }]);
        assert_eq!(
            err.to_string(),
            "Configuration validation failed:\n  - sensor.poll_interval: too short"
        );
    }

    #[test]
    fn test_baseline_period() {
        let mut sensor = SensorConfig::default();
        assert_eq!(sensor.baseline_period(), Some(Duration::from_secs(60)));
        sensor.baseline_interval = 0;
        assert_eq!(sensor.baseline_period(), None);
        assert_eq!(sensor.poll_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_to_store_config() {
        let storage = StorageConfig {
            path: PathBuf::from("/data/airmon"),
            capacity: 0,
            utc_offset_minutes: 90,
            pretty: true,
        };
        let store = storage.to_store_config().unwrap();
        assert_eq!(store.root, PathBuf::from("/data/airmon"));
        assert_eq!(store.capacity, 0);
        assert_eq!(store.utc_offset.whole_minutes(), 90);
        assert!(store.pretty);

        let bad = StorageConfig {
            utc_offset_minutes: 26 * 60,
            ..storage
        };
        assert!(matches!(
            bad.to_store_config(),
            Err(ConfigError::Validation(_))
        ));
    }
}
