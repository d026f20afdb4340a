//! Generalized-time helpers for `YYYYMMDDHHMMSSZ` attribute values.

use chrono::{DateTime, NaiveDateTime, Utc};

const DIRECTORY_TIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Parse a fixed-width `YYYYMMDDHHMMSSZ` value. Anything else yields `None`.
pub fn parse_directory_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.len() != 15 {
        return None;
    }
    NaiveDateTime::parse_from_str(value, DIRECTORY_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as `YYYYMMDDHHMMSSZ`.
pub fn format_directory_time(value: &DateTime<Utc>) -> String {
    value.format(DIRECTORY_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_directory_time() {
        let parsed = parse_directory_time("20240131235959Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_parse_rejects_other_widths() {
        assert!(parse_directory_time("20240131Z").is_none());
        assert!(parse_directory_time("20240131235959.0Z").is_none());
        assert!(parse_directory_time("").is_none());
        assert!(parse_directory_time("2024013123595XZ").is_none());
    }

    #[test]
    fn test_format_directory_time() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 4, 8, 5, 0).unwrap();
        assert_eq!(format_directory_time(&ts), "20230704080500Z");
    }
}
