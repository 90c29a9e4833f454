//! Value types for the airmon home air-quality monitor.
//!
//! This crate holds the small, copyable values that cross the boundary of
//! the embedded time-series store (`airmon-store`) and the process that
//! feeds it (`airmon-service`).
//!
//! # Features
//!
//! - [`Reading`]: one timestamped concentration sample
//! - [`Baseline`]: the gas sensor's two calibration words
//! - [`CalendarDay`]: (year, day-of-year) grouping used for archival
//!
//! # Example
//!
//! ```
//! use airmon_types::{Baseline, Reading};
//! use time::UtcOffset;
//!
//! let reading = Reading::from_unix(1_262_390_400, 412.0)?;
//! assert_eq!(reading.calendar_day(UtcOffset::UTC).ordinal(), 2);
//! assert!(!Baseline::UNSET.is_set());
//! # Ok::<(), airmon_types::TypeError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{TypeError, TypeResult};
pub use types::{Baseline, CalendarDay, Reading, utc_offset_from_minutes};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};
    use time::{Month, UtcOffset};

    // --- Reading ---

    #[test]
    fn test_reading_new_truncates_subsecond() {
        let reading = Reading::new(datetime!(2010-01-01 00:00:59.999 UTC), 23.0);
        assert_eq!(reading.timestamp, datetime!(2010-01-01 00:00:59 UTC));
        assert_eq!(reading.timestamp.nanosecond(), 0);

        let shifted = Reading::new(datetime!(2010-01-01 09:30:15.25 +05:30), 23.0);
        assert_eq!(shifted.timestamp, datetime!(2010-01-01 09:30:15 +05:30));
        assert_eq!(shifted.timestamp.offset().whole_minutes(), 330);
    }

    #[test]
    fn test_reading_from_unix() {
        let reading = Reading::from_unix(0, 1.5).unwrap();
        assert_eq!(reading.timestamp, datetime!(1970-01-01 00:00:00 UTC));
        assert_eq!(reading.concentration, 1.5);
    }

    #[test]
    fn test_reading_from_unix_out_of_range() {
        let result = Reading::from_unix(i64::MAX, 1.0);
        assert_eq!(result, Err(TypeError::InvalidTimestamp(i64::MAX)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_wire_shape() {
        let reading = Reading::new(datetime!(2010-01-02 00:00:00 UTC), 412.5);
        let json = serde_json::to_value(reading).unwrap();

        assert_eq!(json, serde_json::json!({"t": 1_262_390_400, "v": 412.5}));

        let decoded: Reading = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, reading);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_rejects_legacy_shape() {
        let legacy = r#"{"Time":"2010-01-01T00:00:00Z","Co2Value":1.0}"#;
        assert!(serde_json::from_str::<Reading>(legacy).is_err());
    }

    // --- CalendarDay ---

    #[test]
    fn test_calendar_day_year_and_ordinal() {
        let day = CalendarDay::of(datetime!(2012-12-31 23:59:59 UTC), UtcOffset::UTC);
        assert_eq!(day.year(), 2012);
        assert_eq!(day.ordinal(), 366);
        assert_eq!(day.month(), Month::December);
        assert_eq!(day.day(), 31);
    }

    #[test]
    fn test_calendar_day_same_day_of_month_different_month() {
        let jan = CalendarDay::of(datetime!(2010-01-15 12:00 UTC), UtcOffset::UTC);
        let feb = CalendarDay::of(datetime!(2010-02-15 12:00 UTC), UtcOffset::UTC);
        assert_ne!(jan, feb);
    }

    #[test]
    fn test_calendar_day_same_ordinal_different_year() {
        let a = CalendarDay::of(datetime!(2010-03-01 00:00 UTC), UtcOffset::UTC);
        let b = CalendarDay::of(datetime!(2011-03-01 00:00 UTC), UtcOffset::UTC);
        assert_eq!(a.ordinal(), b.ordinal());
        assert_ne!(a, b);
    }

    #[test]
    fn test_calendar_day_respects_offset() {
        let instant = datetime!(2010-01-01 23:30 UTC);
        let utc = CalendarDay::of(instant, UtcOffset::UTC);
        let plus_one = CalendarDay::of(instant, offset!(+1));

        assert_eq!(utc.ordinal(), 1);
        assert_eq!(plus_one.ordinal(), 2);
    }

    #[test]
    fn test_calendar_day_display() {
        let day = CalendarDay::of(datetime!(2010-01-02 08:00 UTC), UtcOffset::UTC);
        assert_eq!(day.to_string(), "2010-01-02");
    }

    #[test]
    fn test_utc_offset_from_minutes() {
        assert_eq!(utc_offset_from_minutes(0).unwrap(), UtcOffset::UTC);
        assert_eq!(utc_offset_from_minutes(-330).unwrap().whole_minutes(), -330);
        assert_eq!(
            utc_offset_from_minutes(19 * 60),
            Err(TypeError::InvalidOffset(19 * 60))
        );
        assert_eq!(
            utc_offset_from_minutes(i32::MAX),
            Err(TypeError::InvalidOffset(i32::MAX))
        );
    }

    // --- Baseline ---

    #[test]
    fn test_baseline_is_set() {
        assert!(!Baseline::UNSET.is_set());
        assert!(!Baseline::new(1, 0).is_set());
        assert!(!Baseline::new(0, 1).is_set());
        assert!(Baseline::new(1, 2).is_set());
        assert_eq!(Baseline::default(), Baseline::UNSET);
    }

    #[test]
    fn test_baseline_display() {
        assert_eq!(
            Baseline::new(0x8A2C, 0x8F10).to_string(),
            "eCO2=0x8A2C TVOC=0x8F10"
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn calendar_day_matches_year_and_ordinal(
                a in 0i64..4_102_444_800,
                b in 0i64..4_102_444_800,
            ) {
                let ra = Reading::from_unix(a, 0.0).unwrap();
                let rb = Reading::from_unix(b, 0.0).unwrap();
                let da = ra.calendar_day(UtcOffset::UTC);
                let db = rb.calendar_day(UtcOffset::UTC);

                let same = ra.timestamp.year() == rb.timestamp.year()
                    && ra.timestamp.ordinal() == rb.timestamp.ordinal();
                prop_assert_eq!(da == db, same);
            }
        }
    }
}
