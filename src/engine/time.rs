//! Date and time helpers shared by the engine and the ingest path

use chrono::{
    DateTime, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a UTC timestamp as found in the status feed.
///
/// Accepts `2024-10-14 10:00:00 UTC`, `2023-01-22 12:09:39.388884 UTC`, the same
/// without the ` UTC` suffix, and RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = trimmed
        .strip_suffix("UTC")
        .map(str::trim_end)
        .unwrap_or(trimmed);

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Parse a wall-clock time of day (`HH:MM:SS` or `HH:MM`)
pub fn parse_local_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

pub fn parse_zone(raw: &str) -> Option<Tz> {
    raw.trim().parse::<Tz>().ok()
}

/// Day index used by the schedule feed: 0 = Monday .. 6 = Sunday
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

/// Resolve a local wall-clock time in `tz` to a UTC instant.
///
/// Times repeated by a backward transition take the earlier instant. Times
/// skipped by a forward transition are read with the offset in force before
/// the transition, which lands them after the gap (02:30 on a spring-forward
/// night becomes 03:30 local).
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(local - TimeDelta::days(1)))
                .fix();
            (local - TimeDelta::seconds(i64::from(before.local_minus_utc()))).and_utc()
        }
    }
}

/// Length of a span in minutes, with sub-second precision
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::America::New_York;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 14, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-10-14 10:00:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-14 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-14T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-14T06:00:00-04:00"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_fractional_seconds() {
        let parsed = parse_timestamp("2023-01-22 12:09:39.388884 UTC").unwrap();
        assert_eq!(parsed.second(), 39);
        assert_eq!(parsed.nanosecond(), 388_884_000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_local_time() {
        assert_eq!(
            parse_local_time("09:30:15"),
            NaiveTime::from_hms_opt(9, 30, 15)
        );
        assert_eq!(parse_local_time("17:00"), NaiveTime::from_hms_opt(17, 0, 0));
        assert!(parse_local_time("25:00:00").is_none());
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!(parse_zone("America/New_York"), Some(New_York));
        assert!(parse_zone("Mars/Olympus_Mons").is_none());
    }

    #[test]
    fn test_weekday_index_starts_monday() {
        assert_eq!(weekday_index(Weekday::Mon), 0);
        assert_eq!(weekday_index(Weekday::Sun), 6);
    }

    #[test]
    fn test_local_to_utc_follows_dst() {
        // EDT (UTC-4) in October, EST (UTC-5) in December
        assert_eq!(
            local_to_utc(New_York, naive(2024, 10, 14, 9, 0)),
            Utc.with_ymd_and_hms(2024, 10, 14, 13, 0, 0).unwrap()
        );
        assert_eq!(
            local_to_utc(New_York, naive(2024, 12, 16, 9, 0)),
            Utc.with_ymd_and_hms(2024, 12, 16, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_local_to_utc_skipped_time_lands_after_gap() {
        // 2024-03-10 02:30 does not exist in New York
        assert_eq!(
            local_to_utc(New_York, naive(2024, 3, 10, 2, 30)),
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_local_to_utc_repeated_time_takes_earliest() {
        // 2024-11-03 01:30 happens twice in New York; first as EDT
        assert_eq!(
            local_to_utc(New_York, naive(2024, 11, 3, 1, 30)),
            Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_minutes_between() {
        let start = Utc.with_ymd_and_hms(2024, 10, 14, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 10, 14, 11, 30, 30).unwrap();
        assert_eq!(minutes_between(start, end), 90.5);
    }
}
