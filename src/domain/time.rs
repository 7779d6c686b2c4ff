//! Timestamp parsing and formatting.
//!
//! Demand exports are not consistent about date-time layout, so we accept a
//! small fixed set of formats. Parsing stays deterministic: the first format
//! that matches wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub type Timestamp = NaiveDateTime;

/// Layout used for every timestamp we emit (CSV exports, index tables).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FMTS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FMTS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp cell. Date-only values mean midnight.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    let s = s.trim();
    for fmt in DATETIME_FMTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    // Explicit offsets are folded into UTC wall time.
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.naive_utc());
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(t) = d.and_hms_opt(0, 0, 0) {
                return Ok(t);
            }
        }
    }
    Err(format!(
        "Invalid timestamp '{s}'. Expected YYYY-MM-DD HH:MM[:SS], an RFC 3339 date-time, or YYYY-MM-DD."
    ))
}

/// Interpret an integer as epoch milliseconds (the pandas `to_json` default).
pub fn timestamp_from_epoch_millis(ms: i64) -> Result<Timestamp, String> {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.naive_utc())
        .ok_or_else(|| format!("Epoch timestamp {ms} is out of range."))
}

pub fn format_timestamp(t: Timestamp) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_h(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn accepts_common_layouts() {
        let want = ymd_h(2017, 1, 31, 23);
        assert_eq!(parse_timestamp("2017-01-31 23:00:00").unwrap(), want);
        assert_eq!(parse_timestamp("2017-01-31T23:00:00").unwrap(), want);
        assert_eq!(parse_timestamp("2017-01-31 23:00").unwrap(), want);
        assert_eq!(parse_timestamp("01/31/2017 23:00").unwrap(), want);
        assert_eq!(parse_timestamp("2017-01-31T23:00:00.000").unwrap(), want);
        assert_eq!(parse_timestamp("2017-02-01T00:00:00+01:00").unwrap(), want);
    }

    #[test]
    fn date_only_means_midnight() {
        assert_eq!(parse_timestamp("2017-02-01").unwrap(), ymd_h(2017, 2, 1, 0));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("not-a-date").unwrap_err();
        assert!(err.contains("not-a-date"));
    }

    #[test]
    fn epoch_millis_round_trip_through_format() {
        let t = timestamp_from_epoch_millis(1_485_907_200_000).unwrap();
        assert_eq!(format_timestamp(t), "2017-02-01 00:00:00");
    }
}
