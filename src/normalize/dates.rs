//! Lenient date parsing for upstream timestamps

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`; `None` if unparseable
pub fn parse_optional_date(input: Option<&str>) -> Option<DateTime<Utc>> {
    let value = input?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a date, falling back to `fallback` when unparseable
pub fn parse_required_date(input: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    parse_optional_date(input).unwrap_or(fallback)
}

/// Parse a date, falling back to the current time
pub fn parse_required_date_or_now(input: Option<&str>) -> DateTime<Utc> {
    parse_required_date(input, Utc::now())
}
