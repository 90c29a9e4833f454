//! Error types for airmon-store.

use std::path::PathBuf;

use airmon_types::Baseline;

/// Result type for airmon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in airmon-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// More readings were requested than the buffer can hold.
    #[error("Requested {requested} readings but buffer capacity is {capacity}")]
    Range { requested: usize, capacity: usize },

    /// The reading cannot be stored because its concentration is NaN or infinite.
    #[error("Invalid reading: concentration {0} is not finite")]
    InvalidReading(f64),

    /// Not enough readings to build a day archive.
    #[error("Insufficient data: {0}")]
    InsufficientData(&'static str),

    /// The calibration baseline has not been set. The stored (zero-containing)
    /// values are still available from the variant.
    #[error("Baseline not set ({0})")]
    BaselineNotSet(Baseline),

    /// A snapshot could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A snapshot could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A snapshot decoded but violates the buffer's structural invariants.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The snapshot predates the versioned format and must be migrated.
    #[error("Legacy snapshot format; run the migration first")]
    LegacyFormat,

    /// The snapshot was written by a newer format version.
    #[error("Unsupported snapshot version {version}")]
    UnsupportedVersion { version: u32 },

    /// Failed to read a file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the storage directory.
    #[error("Failed to create storage directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// One or both snapshot files failed to save.
    #[error("Save failed: {}", join_errors(.0))]
    Save(Vec<Error>),
}

impl Error {
    /// Whether this error means the file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
