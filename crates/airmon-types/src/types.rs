//! Core types for airmon sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, UtcOffset};

use crate::error::{TypeError, TypeResult};

/// A single gas-concentration sample.
///
/// Readings are plain `Copy` values: anything handed out by the store is an
/// independent copy that cannot alias the store's internal slots.
///
/// The timestamp is kept at whole-second precision because that is the
/// resolution of the persisted form (`{"t": <unix-seconds>, "v": <float>}`).
/// Use [`Reading::new`] to get the truncation for free.
///
/// # Examples
///
/// ```
/// use airmon_types::Reading;
/// use time::macros::datetime;
///
/// let reading = Reading::new(datetime!(2010-01-01 12:00:00.750 UTC), 415.0);
/// assert_eq!(reading.timestamp, datetime!(2010-01-01 12:00:00 UTC));
/// assert_eq!(reading.concentration, 415.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// When the sample was taken.
    #[cfg_attr(feature = "serde", serde(rename = "t", with = "time::serde::timestamp"))]
    pub timestamp: OffsetDateTime,
    /// Measured concentration (eCO2 in ppm for the SGP30).
    #[cfg_attr(feature = "serde", serde(rename = "v"))]
    pub concentration: f64,
}

impl Reading {
    /// Create a reading, dropping any sub-second part of the timestamp.
    #[must_use]
    pub fn new(timestamp: OffsetDateTime, concentration: f64) -> Self {
        // Zero is always a valid nanosecond, so this never falls back.
        let whole = timestamp.replace_nanosecond(0).unwrap_or(timestamp);
        Self {
            timestamp: whole,
            concentration,
        }
    }

    /// Create a reading stamped with the current UTC time.
    #[must_use]
    pub fn now(concentration: f64) -> Self {
        Self::new(OffsetDateTime::now_utc(), concentration)
    }

    /// Create a reading from a Unix timestamp in seconds.
    pub fn from_unix(seconds: i64, concentration: f64) -> TypeResult<Self> {
        let timestamp = OffsetDateTime::from_unix_timestamp(seconds)
            .map_err(|_| TypeError::InvalidTimestamp(seconds))?;
        Ok(Self {
            timestamp,
            concentration,
        })
    }

    /// The calendar day this reading falls on, evaluated at `offset`.
    #[must_use]
    pub fn calendar_day(&self, offset: UtcOffset) -> CalendarDay {
        CalendarDay::of(self.timestamp, offset)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.concentration,
            self.timestamp.unix_timestamp()
        )
    }
}

/// A calendar day, identified by its (year, day-of-year) pair.
///
/// Two instants are on the same calendar day when their year and ordinal
/// match after converting both to the same UTC offset. Day-of-month alone
/// is never used for the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(Date);

impl CalendarDay {
    /// The calendar day of `instant` as seen from `offset`.
    #[must_use]
    pub fn of(instant: OffsetDateTime, offset: UtcOffset) -> Self {
        Self(instant.to_offset(offset).date())
    }

    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Day of the year, 1-based.
    #[must_use]
    pub fn ordinal(&self) -> u16 {
        self.0.ordinal()
    }

    /// Month of the year.
    #[must_use]
    pub fn month(&self) -> Month {
        self.0.month()
    }

    /// Day of the month, 1-based.
    #[must_use]
    pub fn day(&self) -> u8 {
        self.0.day()
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.year(),
            u8::from(self.month()),
            self.day()
        )
    }
}

/// Build a [`UtcOffset`] from a whole number of minutes east of UTC.
///
/// # Examples
///
/// ```
/// use airmon_types::utc_offset_from_minutes;
///
/// assert_eq!(utc_offset_from_minutes(90).unwrap().whole_minutes(), 90);
/// assert!(utc_offset_from_minutes(24 * 60).is_err());
/// ```
pub fn utc_offset_from_minutes(minutes: i32) -> TypeResult<UtcOffset> {
    let seconds = minutes
        .checked_mul(60)
        .ok_or(TypeError::InvalidOffset(minutes))?;
    UtcOffset::from_whole_seconds(seconds).map_err(|_| TypeError::InvalidOffset(minutes))
}

/// Sensor calibration baseline.
///
/// A value of `0` in either field means the sensor has not been calibrated
/// yet; the pair is only usable when both fields are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Baseline {
    /// eCO2 baseline word.
    pub eco2: u16,
    /// TVOC baseline word.
    pub tvoc: u16,
}

impl Baseline {
    /// A baseline that has never been calibrated.
    pub const UNSET: Self = Self { eco2: 0, tvoc: 0 };

    /// Create a baseline from its two words.
    #[must_use]
    pub fn new(eco2: u16, tvoc: u16) -> Self {
        Self { eco2, tvoc }
    }

    /// Whether both words carry a calibration value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.eco2 != 0 && self.tvoc != 0
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eCO2=0x{:04X} TVOC=0x{:04X}", self.eco2, self.tvoc)
    }
}
