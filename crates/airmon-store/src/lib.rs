//! Ring-buffered persistence for air-quality readings.
//!
//! This crate keeps the most recent concentration readings in a fixed-size
//! ring buffer, snapshots it to JSON, archives each finished calendar day to
//! its own file, and stores the sensor's calibration baseline.
//!
//! # Features
//!
//! - Fixed-capacity ring buffer, 48 hours of one-minute samples by default
//! - Day archives (`archive_YYYY_MM_DD.json`) written on calendar-day rollover
//! - Baseline storage that carries unknown companion fields through untouched
//! - Versioned snapshot format with a one-shot legacy migration
//!
//! # Example
//!
//! ```no_run
//! use airmon_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new("/var/lib/airmon"));
//!
//! for reading in store.peek_latest(10)? {
//!     println!("{}", reading);
//! }
//! # Ok::<(), airmon_store::Error>(())
//! ```

mod archive;
mod baseline;
mod error;
mod ring;
mod snapshot;
mod store;

pub use archive::{ARCHIVE_WINDOW, DayArchive, DayArchiver};
pub use baseline::BaselineStore;
pub use error::{Error, Result};
pub use ring::{DEFAULT_CAPACITY, RingBuffer};
pub use snapshot::{
    BUFFER_FORMAT_VERSION, CONFIG_FILE, MigrationOutcome, POINTS_FILE, config_path,
    migrate_legacy_buffer, points_path,
};
pub use store::{LoadReport, Store, StoreConfig};

/// Default storage directory following platform conventions.
///
/// - Linux: `~/.local/share/airmon`
/// - macOS: `~/Library/Application Support/airmon`
/// - Windows: `C:\Users\<user>\AppData\Local\airmon`
pub fn default_storage_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("airmon")
}
