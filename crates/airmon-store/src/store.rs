//! Main store implementation.
//!
//! [`Store`] is a monitor: one coarse [`Mutex`] guards the ring buffer and the
//! baseline, and every public method takes it for its full duration,
//! including the file I/O done by saves and archival. Operations therefore
//! observe a total order and never see another operation half-applied.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use time::UtcOffset;
use tracing::{debug, info, warn};

use airmon_types::{Baseline, Reading};

use crate::archive::DayArchiver;
use crate::baseline::BaselineStore;
use crate::error::{Error, Result};
use crate::ring::{DEFAULT_CAPACITY, RingBuffer};
use crate::snapshot;

/// Settings supplied by the process wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the snapshots and archives.
    pub root: PathBuf,
    /// Ring buffer capacity. `0` selects [`DEFAULT_CAPACITY`].
    pub capacity: usize,
    /// Offset at which calendar days begin.
    pub utc_offset: UtcOffset,
    /// Write indented JSON.
    pub pretty: bool,
}

impl StoreConfig {
    /// Defaults for everything but the storage root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            capacity: DEFAULT_CAPACITY,
            utc_offset: UtcOffset::UTC,
            pretty: false,
        }
    }

    /// Set the ring buffer capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the offset at which calendar days begin.
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Write indented JSON.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Outcome of [`Store::load`], one result per snapshot file.
///
/// The two halves are independent: a corrupt buffer file does not affect a
/// valid config file and vice versa. A failed half has been reset to its
/// empty default.
#[derive(Debug)]
pub struct LoadReport {
    /// Result of loading the buffer snapshot.
    pub buffer: Result<()>,
    /// Result of loading the baseline and companion data.
    pub baseline: Result<()>,
}

impl LoadReport {
    /// Whether both files loaded.
    pub fn is_clean(&self) -> bool {
        self.buffer.is_ok() && self.baseline.is_ok()
    }

    /// Errors from either half.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        [&self.buffer, &self.baseline]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }

    fn log(&self) {
        for error in self.errors() {
            if error.is_not_found() {
                info!("No snapshot yet, starting empty: {}", error);
            } else {
                warn!("Discarded unreadable snapshot: {}", error);
            }
        }
    }
}

struct Inner {
    buffer: RingBuffer,
    baseline: BaselineStore,
}

/// JSON-file backed store for sensor readings and the calibration baseline.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```no_run
/// use airmon_store::{Store, StoreConfig};
/// use airmon_types::Reading;
///
/// let store = Store::open(StoreConfig::new("/var/lib/airmon").capacity(2880));
/// store.push(Reading::now(612.0))?;
/// let last_hour = store.peek_latest(60)?;
/// store.close()?;
/// # Ok::<(), airmon_store::Error>(())
/// ```
pub struct Store {
    config: StoreConfig,
    archiver: DayArchiver,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create an empty store without touching the filesystem.
    pub fn new(config: StoreConfig) -> Self {
        let archiver = DayArchiver::new(&config.root, config.utc_offset).pretty(config.pretty);
        let inner = Inner {
            buffer: RingBuffer::new(config.capacity),
            baseline: BaselineStore::new(),
        };

        Self {
            config,
            archiver,
            inner: Mutex::new(inner),
        }
    }

    /// Create a store and populate it from the snapshots under `config.root`.
    ///
    /// Missing or unreadable snapshots are logged and leave the affected half
    /// empty. Use [`Store::new`] followed by [`Store::load`] to inspect the
    /// outcome instead.
    pub fn open(config: StoreConfig) -> Self {
        info!("Opening store at {}", config.root.display());
        let store = Self::new(config);
        store.load().log();
        store
    }

    /// Open the default storage location with default settings.
    pub fn open_default() -> Self {
        Self::open(StoreConfig::new(crate::default_storage_dir()))
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the buffer snapshot.
    pub fn points_path(&self) -> PathBuf {
        snapshot::points_path(&self.config.root)
    }

    /// Path of the baseline snapshot.
    pub fn config_path(&self) -> PathBuf {
        snapshot::config_path(&self.config.root)
    }

    /// Directory archives are written to.
    pub fn archive_dir(&self) -> &Path {
        self.archiver.root()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the buffer torn: every
        // mutation is a single slot write or a whole-value replacement.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload both snapshots from disk, independently.
    pub fn load(&self) -> LoadReport {
        let mut inner = self.lock();

        let buffer = self.load_buffer(&mut inner);
        if buffer.is_err() {
            inner.buffer = RingBuffer::new(self.config.capacity);
        }

        let baseline = snapshot::read_file(&self.config_path())
            .and_then(|raw| BaselineStore::decode(&raw))
            .map(|loaded| inner.baseline = loaded);
        if baseline.is_err() {
            inner.baseline = BaselineStore::new();
        }

        LoadReport { buffer, baseline }
    }

    fn load_buffer(&self, inner: &mut Inner) -> Result<()> {
        let path = self.points_path();
        let raw = snapshot::read_file(&path)?;

        match inner.buffer.decode(&raw) {
            Err(Error::LegacyFormat) => {
                // Converted in place so the next save cannot clobber the old readings.
                info!("Found legacy snapshot at {}, migrating", path.display());
                snapshot::migrate_legacy_buffer(&path, self.config.pretty)?;
                inner.buffer.decode(&snapshot::read_file(&path)?)?;
            }
            other => other?,
        }

        inner.buffer.resize(self.config.capacity);
        debug!("Loaded {} readings from {}", inner.buffer.len(), path.display());
        Ok(())
    }

    /// Append a reading, archiving the previous day first if it ends here.
    ///
    /// Archival failures are logged and never stop the push. A NaN or
    /// infinite concentration is rejected with [`Error::InvalidReading`],
    /// since JSON cannot represent it.
    pub fn push(&self, reading: Reading) -> Result<()> {
        if !reading.concentration.is_finite() {
            return Err(Error::InvalidReading(reading.concentration));
        }

        let mut inner = self.lock();

        let newest = inner.buffer.peek(0);
        if self.archiver.should_archive(newest.as_ref(), &reading) {
            match self.archiver.archive(&inner.buffer) {
                Ok(path) => info!("Archived previous day to {}", path.display()),
                Err(e) => warn!("Failed to archive previous day: {}", e),
            }
        }

        inner.buffer.push(reading);
        Ok(())
    }

    /// Up to `count` readings, newest first, skipping empty slots.
    ///
    /// `0` means the whole buffer; more than the capacity is an
    /// [`Error::Range`].
    pub fn peek_latest(&self, count: usize) -> Result<Vec<Reading>> {
        let inner = self.lock();
        let slots = inner.buffer.peek_latest(count)?;
        Ok(slots.into_iter().flatten().collect())
    }

    /// The newest reading, if any.
    pub fn latest(&self) -> Option<Reading> {
        self.lock().buffer.peek(0)
    }

    /// Change the buffer capacity, keeping the newest readings.
    pub fn resize(&self, capacity: usize) -> Result<()> {
        self.lock().buffer.resize(capacity);
        Ok(())
    }

    /// Current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.lock().buffer.capacity()
    }

    /// Number of readings held.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Whether no readings are held.
    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// Drop every reading and persist the empty buffer.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.buffer.clear();
        self.save_buffer(&inner)
    }

    /// The stored calibration baseline.
    ///
    /// Fails with [`Error::BaselineNotSet`] (carrying the raw values) when
    /// either word is zero.
    pub fn baseline(&self) -> Result<Baseline> {
        self.lock().baseline.get()
    }

    /// Overwrite the calibration baseline.
    pub fn set_baseline(&self, eco2: u16, tvoc: u16) -> Result<()> {
        self.lock().baseline.set(eco2, tvoc);
        Ok(())
    }

    /// A carried-through companion field.
    pub fn companion(&self, key: &str) -> Option<Value> {
        self.lock().baseline.companion(key).cloned()
    }

    /// Insert or replace a carried-through companion field.
    pub fn set_companion(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().baseline.set_companion(key, value)
    }

    /// Write both snapshot files.
    ///
    /// Both writes are attempted; if either fails the result is an
    /// [`Error::Save`] listing every failure.
    pub fn save(&self) -> Result<()> {
        let inner = self.lock();
        self.save_all(&inner)
    }

    /// Flush both snapshot files on shutdown.
    pub fn close(&self) -> Result<()> {
        let inner = self.lock();
        let result = self.save_all(&inner);
        if result.is_ok() {
            info!("Store flushed to {}", self.config.root.display());
        }
        result
    }

    fn save_all(&self, inner: &Inner) -> Result<()> {
        let errors: Vec<Error> = [self.save_buffer(inner), self.save_baseline(inner)]
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Save(errors))
        }
    }

    fn save_buffer(&self, inner: &Inner) -> Result<()> {
        let encoded = inner.buffer.encode(self.config.pretty)?;
        snapshot::write_file(&self.points_path(), &encoded)
    }

    fn save_baseline(&self, inner: &Inner) -> Result<()> {
        let encoded = inner.baseline.encode(self.config.pretty)?;
        snapshot::write_file(&self.config_path(), &encoded)
    }
}
