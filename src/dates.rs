//! Date handling for backend payloads. The backend speaks `DD-MM-YYYY` and
//! serves print-view dates as `"07, Dec 2025"`; these helpers never fail and
//! hand back the input unchanged when it cannot be understood.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

pub const API_FORMAT: &str = "%d-%m-%Y";

static API_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").unwrap());
static PRINT_VIEW_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}),?\s+([A-Za-z]+)\s+(\d{4})").unwrap());

const FALLBACK_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%d %B %Y", "%Y/%m/%d"];

/// Parses `"07, Dec 2025"`, then common calendar formats.
pub fn parse_api_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Some(caps) = PRINT_VIEW_DATE_RE.captures(input) {
        let normalized = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%d %B %Y") {
            return Some(date);
        }
    }

    for fmt in FALLBACK_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, fmt) {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive())
}

/// Like [`parse_api_date`] but also accepts the backend's own `DD-MM-YYYY`.
pub fn parse_any_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if API_DATE_RE.is_match(trimmed) {
        return NaiveDate::parse_from_str(trimmed, API_FORMAT).ok();
    }
    parse_api_date(trimmed)
}

/// Formats a date for the backend as `DD-MM-YYYY`.
///
/// Empty input means today. Input already in `DD-MM-YYYY` passes through
/// untouched, and anything unparsable is returned as-is.
pub fn format_date_for_api(input: Option<&str>, today: NaiveDate) -> String {
    let Some(raw) = input.filter(|s| !s.trim().is_empty()) else {
        return today.format(API_FORMAT).to_string();
    };
    if API_DATE_RE.is_match(raw) {
        return raw.to_string();
    }
    match parse_api_date(raw) {
        Some(date) => date.format(API_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    #[test]
    fn api_format_is_idempotent() {
        assert_eq!(format_date_for_api(Some("07-12-2025"), today()), "07-12-2025");
        let once = format_date_for_api(Some("2025-12-07"), today());
        assert_eq!(format_date_for_api(Some(&once), today()), once);
    }

    #[test]
    fn iso_dates_convert() {
        assert_eq!(format_date_for_api(Some("2025-12-07"), today()), "07-12-2025");
    }

    #[test]
    fn print_view_dates_convert() {
        assert_eq!(format_date_for_api(Some("07, Dec 2025"), today()), "07-12-2025");
        assert_eq!(format_date_for_api(Some("6, Jan 2026"), today()), "06-01-2026");
        assert_eq!(format_date_for_api(Some("6 January 2026"), today()), "06-01-2026");
    }

    #[test]
    fn missing_date_means_today() {
        assert_eq!(format_date_for_api(None, today()), "09-03-2026");
        assert_eq!(format_date_for_api(Some("  "), today()), "09-03-2026");
    }

    #[test]
    fn garbage_is_returned_unchanged() {
        assert_eq!(format_date_for_api(Some("next tuesday"), today()), "next tuesday");
    }

    #[test]
    fn parse_any_date_reads_backend_format() {
        assert_eq!(parse_any_date("31-01-2026"), NaiveDate::from_ymd_opt(2026, 1, 31));
        assert_eq!(parse_any_date("31-02-2026"), None);
        assert_eq!(parse_any_date("2026-01-31T10:00:00Z"), NaiveDate::from_ymd_opt(2026, 1, 31));
    }
}
