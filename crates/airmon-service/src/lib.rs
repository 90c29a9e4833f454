//! Background collector for a home air-quality monitor.
//!
//! This crate provides a service that:
//! - Polls an eCO2/TVOC sensor on a schedule
//! - Pushes each reading into the ring-buffered store and saves it
//! - Keeps the sensor's calibration baseline across restarts
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/airmon/service.toml`:
//!
//! ```toml
//! [storage]
//! path = "/var/lib/airmon"
//! capacity = 2880
//! utc_offset_minutes = 0
//! pretty = false
//!
//! [sensor]
//! poll_interval = 60
//! baseline_interval = 60
//! ```

pub mod collector;
pub mod config;
pub mod sensor;

pub use collector::{Collector, CollectorError};
pub use config::{Config, ConfigError, SensorConfig, StorageConfig, ValidationError};
pub use sensor::{GasSensor, Measurement, SensorError, SimulatedSensor};
