//! Utility functions for date handling, string manipulation, and URL slugs.
//!
//! - Lenient parsing of the date formats the listing sites publish
//! - Russian date rendering for message templates
//! - String truncation for logging and for Telegram length limits
//! - Identifier derivation from detail-page URLs

use chrono::{DateTime, Local, Locale, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with an ellipsis and a count of
/// the dropped characters appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// One-line preview of a multi-line message for log output.
pub fn preview(message: &str) -> String {
    truncate_for_log(&message.replace('\n', " "), 40)
}

/// Cut `s` to at most `max` characters, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Parse a timestamp as published by listing pages.
///
/// Accepts RFC 3339 with an offset as well as naive `YYYY-MM-DD[ T]HH:MM[:SS]`
/// and bare `YYYY-MM-DD`, the latter two interpreted in local time.
pub fn parse_local_datetime(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let naive = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date(raw).map(|d| d.and_time(NaiveTime::MIN)))?;

    Local.from_local_datetime(&naive).earliest()
}

/// Parse the leading `YYYY-MM-DD` of a string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Uppercased short Russian weekday, e.g. `ПТ`.
pub fn weekday_short_ru(date: NaiveDate) -> String {
    as_utc(date)
        .format_localized("%a", Locale::ru_RU)
        .to_string()
        .to_uppercase()
}

/// Long Russian date, e.g. `16 октября 2026 г.`.
pub fn long_date_ru(date: NaiveDate) -> String {
    as_utc(date)
        .format_localized("%-d %B %Y г.", Locale::ru_RU)
        .to_string()
}

fn as_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Last non-empty path segment of a URL or path, e.g. the slug of
/// `https://planetakino.ua/odessa/movies/dune/`.
pub fn last_path_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').filter(|s| !s.is_empty()).last()
}
