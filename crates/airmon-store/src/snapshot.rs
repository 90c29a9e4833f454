//! On-disk snapshot formats and the legacy migration.
//!
//! Two files live under the storage root:
//!
//! - `airmon_points.json`: `{"version": 1, "index": <head>, "values": [<reading|null>, ...]}`
//! - `airmon_config.json`: `{"eco2": <u16>, "tvoc": <u16>, ...companion fields}`
//!
//! Readings use the canonical `{"t": <unix-seconds>, "v": <float>}` shape.
//! Buffer files written before the `version` field existed stored readings as
//! `{"Time": <rfc3339>, "Co2Value": <float>}` or `{"t": <rfc3339>, "v": <float>}`;
//! those are rejected at load time and converted once by
//! [`migrate_legacy_buffer`].
//!
//! Writes go straight to the target path. There is no temp-file-and-rename
//! step, so a crash mid-save can leave one file newer than the other.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use airmon_types::Reading;

use crate::error::{Error, Result};

/// Version tag written into every buffer snapshot.
pub const BUFFER_FORMAT_VERSION: u32 = 1;

/// Buffer snapshot file name.
pub const POINTS_FILE: &str = "airmon_points.json";

/// Baseline and companion data file name.
pub const CONFIG_FILE: &str = "airmon_config.json";

#[derive(Serialize)]
struct BufferFileRef<'a> {
    version: u32,
    index: usize,
    values: &'a [Option<Reading>],
}

#[derive(Deserialize)]
struct BufferFile {
    version: u32,
    index: usize,
    values: Vec<Option<Reading>>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    version: Option<u32>,
}

pub(crate) fn encode_buffer(
    head: usize,
    slots: &[Option<Reading>],
    pretty: bool,
) -> Result<Vec<u8>> {
    to_json(
        &BufferFileRef {
            version: BUFFER_FORMAT_VERSION,
            index: head,
            values: slots,
        },
        pretty,
    )
}

pub(crate) fn decode_buffer(raw: &[u8]) -> Result<(usize, Vec<Option<Reading>>)> {
    let envelope: Envelope = serde_json::from_slice(raw).map_err(Error::Decode)?;
    match envelope.version {
        None => return Err(Error::LegacyFormat),
        Some(version) if version > BUFFER_FORMAT_VERSION => {
            return Err(Error::UnsupportedVersion { version });
        }
        Some(_) => {}
    }

    let file: BufferFile = serde_json::from_slice(raw).map_err(Error::Decode)?;
    if file.values.is_empty() {
        return Err(Error::InvalidSnapshot("value array is empty".to_string()));
    }
    if file.index >= file.values.len() {
        return Err(Error::InvalidSnapshot(format!(
            "index {} outside capacity {} (format version {})",
            file.index,
            file.values.len(),
            file.version
        )));
    }

    Ok((file.index, file.values))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(Error::Encode)
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `contents` to `path`, creating the parent directory if needed.
pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, contents).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

// Legacy reading shapes, newest lineage first.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyReading {
    Named {
        #[serde(rename = "Time", with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        #[serde(rename = "Co2Value")]
        value: f64,
    },
    ShortRfc3339 {
        #[serde(with = "time::serde::rfc3339")]
        t: OffsetDateTime,
        v: f64,
    },
    ShortUnix {
        #[serde(with = "time::serde::timestamp")]
        t: OffsetDateTime,
        v: f64,
    },
}

impl From<LegacyReading> for Reading {
    fn from(legacy: LegacyReading) -> Self {
        match legacy {
            LegacyReading::Named { time, value } => Reading::new(time, value),
            LegacyReading::ShortRfc3339 { t, v } | LegacyReading::ShortUnix { t, v } => {
                Reading::new(t, v)
            }
        }
    }
}

#[derive(Deserialize)]
struct LegacyBufferFile {
    index: usize,
    values: Vec<Option<LegacyReading>>,
}

/// What [`migrate_legacy_buffer`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The file was already in the current format.
    AlreadyCurrent,
    /// The file was rewritten; carries the number of readings converted.
    Migrated(usize),
}

/// Rewrite a legacy buffer snapshot in the current versioned format.
///
/// Files that already carry a version tag are left untouched. Anything that
/// parses as neither format is reported as a decode error and not modified.
pub fn migrate_legacy_buffer(path: &Path, pretty: bool) -> Result<MigrationOutcome> {
    let raw = read_file(path)?;

    match decode_buffer(&raw) {
        Ok(_) => return Ok(MigrationOutcome::AlreadyCurrent),
        Err(Error::LegacyFormat) => {}
        Err(e) => return Err(e),
    }

    let legacy: LegacyBufferFile = serde_json::from_slice(&raw).map_err(Error::Decode)?;
    if legacy.values.is_empty() || legacy.index >= legacy.values.len() {
        return Err(Error::InvalidSnapshot(format!(
            "legacy index {} outside capacity {}",
            legacy.index,
            legacy.values.len()
        )));
    }

    let slots: Vec<Option<Reading>> = legacy
        .values
        .into_iter()
        .map(|slot| slot.map(Reading::from))
        .collect();
    let converted = slots.iter().flatten().count();

    write_file(path, &encode_buffer(legacy.index, &slots, pretty)?)?;
    info!(
        "Migrated {} readings in {} to format version {}",
        converted,
        path.display(),
        BUFFER_FORMAT_VERSION
    );

    Ok(MigrationOutcome::Migrated(converted))
}

/// Path of the buffer snapshot under `root`.
pub fn points_path(root: &Path) -> PathBuf {
    root.join(POINTS_FILE)
}

/// Path of the config snapshot under `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_decode_buffer_legacy_without_version() {
        let raw = br#"{"index":0,"values":[{"t":1,"v":2.0}]}"#;
        assert!(matches!(decode_buffer(raw), Err(Error::LegacyFormat)));
    }

    #[test]
    fn test_decode_buffer_newer_version() {
        let raw = br#"{"version":7,"index":0,"values":[null]}"#;
        assert!(matches!(
            decode_buffer(raw),
            Err(Error::UnsupportedVersion { version: 7 })
        ));
    }

    #[test]
    fn test_migrate_named_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = points_path(dir.path());
        std::fs::write(
            &path,
            r#"{"index":1,"values":[
                {"Time":"2010-01-01T00:00:00Z","Co2Value":1.0},
                {"Time":"2010-01-01T00:01:00.5+01:00","Co2Value":2.0},
                null
            ]}"#,
        )
        .unwrap();

        let outcome = migrate_legacy_buffer(&path, false).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated(2));

        let (head, slots) = decode_buffer(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(head, 1);
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots[1].unwrap().timestamp,
            datetime!(2010-01-01 00:01:00 +01:00)
        );
        assert_eq!(slots[1].unwrap().concentration, 2.0);
        assert_eq!(slots[2], None);
    }

    #[test]
    fn test_migrate_short_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = points_path(dir.path());
        std::fs::write(
            &path,
            r#"{"index":0,"values":[{"t":"2010-01-02T00:00:00Z","v":3.0},{"t":60,"v":4.0}]}"#,
        )
        .unwrap();

        assert_eq!(
            migrate_legacy_buffer(&path, true).unwrap(),
            MigrationOutcome::Migrated(2)
        );

        let (_, slots) = decode_buffer(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(slots[0].unwrap().timestamp, datetime!(2010-01-02 00:00 UTC));
        assert_eq!(slots[1].unwrap().timestamp.unix_timestamp(), 60);
    }

    #[test]
    fn test_migrate_current_file_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = points_path(dir.path());
        let current = encode_buffer(0, &[None], false).unwrap();
        std::fs::write(&path, &current).unwrap();

        assert_eq!(
            migrate_legacy_buffer(&path, true).unwrap(),
            MigrationOutcome::AlreadyCurrent
        );
        assert_eq!(std::fs::read(&path).unwrap(), current);
    }

    #[test]
    fn test_migrate_garbage_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = points_path(dir.path());
        std::fs::write(&path, "garbagedata").unwrap();

        assert!(matches!(
            migrate_legacy_buffer(&path, false),
            Err(Error::Decode(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbagedata");
    }

    #[test]
    fn test_migrate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = migrate_legacy_buffer(&points_path(dir.path()), false).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("file.json");
        write_file(&path, b"[]").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"[]");
    }
}
