//! Error types for airmon-types.

use thiserror::Error;

/// Errors that can occur when building airmon value types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypeError {
    /// The timestamp cannot be represented as a reading timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// The UTC offset is outside the supported +/-18 hour range.
    #[error("Invalid UTC offset: {0} minutes")]
    InvalidOffset(i32),
}

/// Result type alias using airmon-types' TypeError type.
pub type TypeResult<T> = std::result::Result<T, TypeError>;
