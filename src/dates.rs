// Dates
// Timestamps in the note file format: ISO-8601 with seven fractional digits
// and a colon in the zone offset, e.g. 2009-03-24T13:16:42.0000000+01:00

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};

pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    // leap seconds report more than a billion nanoseconds
    let nanos = date.nanosecond().min(999_999_999);
    format!(
        "{}.{:07}{}",
        date.format("%Y-%m-%dT%H:%M:%S"),
        nanos / 100,
        date.format("%:z")
    )
}

pub fn parse_date(text: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text.trim())
}

/// Value of date fields missing from a note file
pub fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
