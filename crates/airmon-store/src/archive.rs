//! Calendar-day archival of readings about to be evicted.
//!
//! Before a push whose reading falls on a different calendar day than the
//! current newest reading, the outgoing day is written to
//! `archive_YYYY_MM_DD.json` under the storage root as a bare JSON array,
//! newest first.
//!
//! Archives are written once and never read back by the store, so they carry
//! no envelope: each element uses the same canonical `{"t", "v"}` reading
//! shape as format version [`BUFFER_FORMAT_VERSION`](crate::BUFFER_FORMAT_VERSION) of the buffer snapshot.
//!
//! The scan walks the latest day-window from its oldest entry towards the
//! newest and cuts the list at the first entry on the archived day, dropping
//! that entry along with everything older. An archive of a full day of
//! one-minute samples therefore holds 1439 readings, not 1440.

use std::path::{Path, PathBuf};

use time::UtcOffset;
use tracing::debug;

use airmon_types::{CalendarDay, Reading};

use crate::error::{Error, Result};
use crate::ring::RingBuffer;
use crate::snapshot;

/// Readings inspected per archive: one day of one-minute samples.
pub const ARCHIVE_WINDOW: usize = 24 * 60;

/// The readings selected for one archived day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayArchive {
    /// The archived calendar day.
    pub day: CalendarDay,
    /// Readings, newest first.
    pub readings: Vec<Reading>,
}

impl DayArchive {
    /// File name for this archive, e.g. `archive_2010_01_02.json`.
    pub fn file_name(&self) -> String {
        format!(
            "archive_{}_{:02}_{:02}.json",
            self.day.year(),
            u8::from(self.day.month()),
            self.day.day()
        )
    }
}

/// Detects day rollover and writes archive files.
#[derive(Debug, Clone)]
pub struct DayArchiver {
    root: PathBuf,
    offset: UtcOffset,
    pretty: bool,
}

impl DayArchiver {
    /// Archive under `root`, evaluating calendar days at `offset`.
    pub fn new(root: impl Into<PathBuf>, offset: UtcOffset) -> Self {
        Self {
            root: root.into(),
            offset,
            pretty: false,
        }
    }

    /// Write indented JSON.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Directory archives are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether pushing `incoming` after `newest` crosses a calendar day.
    ///
    /// Days are compared as (year, day-of-year). An empty buffer never
    /// triggers archival.
    pub fn should_archive(&self, newest: Option<&Reading>, incoming: &Reading) -> bool {
        newest.is_some_and(|newest| {
            newest.calendar_day(self.offset) != incoming.calendar_day(self.offset)
        })
    }

    /// Select the outgoing day's readings from `buffer`.
    ///
    /// Fails with [`Error::InsufficientData`] when the buffer holds nothing
    /// to archive.
    pub fn collect(&self, buffer: &RingBuffer) -> Result<DayArchive> {
        let mut points = buffer.peek_latest(ARCHIVE_WINDOW.min(buffer.capacity()))?;

        let newest = match points.first() {
            Some(Some(newest)) => *newest,
            _ => return Err(Error::InsufficientData("not enough points saved")),
        };
        let day = newest.calendar_day(self.offset);

        // Oldest-first scan: the first same-day entry and everything older go.
        if let Some(cut) = points
            .iter()
            .rposition(|point| point.is_some_and(|p| p.calendar_day(self.offset) == day))
        {
            points.truncate(cut);
        }

        let readings: Vec<Reading> = points.into_iter().flatten().collect();
        if readings.is_empty() {
            return Err(Error::InsufficientData("not enough valid points"));
        }

        Ok(DayArchive { day, readings })
    }

    /// Write `archive` to its dated file and return the path.
    pub fn write(&self, archive: &DayArchive) -> Result<PathBuf> {
        let path = self.root.join(archive.file_name());
        let encoded = snapshot::to_json(&archive.readings, self.pretty)?;
        snapshot::write_file(&path, &encoded)?;

        debug!(
            "Archived {} readings for {} to {}",
            archive.readings.len(),
            archive.day,
            path.display()
        );
        Ok(path)
    }

    /// Collect and write the outgoing day in one step.
    pub fn archive(&self, buffer: &RingBuffer) -> Result<PathBuf> {
        let archive = self.collect(buffer)?;
        self.write(&archive)
    }
}
