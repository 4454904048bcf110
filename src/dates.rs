//! Date inference from receipt text.
//!
//! Scans the full extracted text with a fixed set of patterns and returns
//! the first plausible match. Receipts are printed day-first in this
//! market, so ambiguous numeric dates parse as day/month/year; the swapped
//! reading is only used when day-first is impossible. When no date is
//! detected the inference defaults to wall-clock "now" at the moment of
//! the call.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Patterns tried in order; the first capture that survives the sanity
/// check wins.
static DATE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // ISO: 2026-01-19, 2026/01/19, 2026.01.19
        (Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").unwrap(), "ymd"),
        // Day-first: 19/01/2026, 19-01-2026, 19.01.2026
        (Regex::new(r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})").unwrap(), "dmy"),
        // Day-first with two-digit year: 19/01/26
        (Regex::new(r"(\d{1,2})[/.](\d{1,2})[/.](\d{2})\b").unwrap(), "dmy_short"),
    ]
});

/// Infer a timestamp from free text, defaulting to now when nothing
/// matches. Absence of a detectable date is not an error.
pub fn infer_date(text: &str) -> DateTime<Utc> {
    detect_date(text).unwrap_or_else(Utc::now)
}

/// First plausible date found in the text, if any.
pub fn detect_date(text: &str) -> Option<DateTime<Utc>> {
    for (pattern, format) in DATE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            if let Some(date) = parse_captured_date(&caps, format) {
                if is_plausible(&date) {
                    return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
            }
        }
    }
    None
}

/// Receipts from before 2000 or after next year are almost certainly
/// misreads of product codes or totals.
fn is_plausible(date: &NaiveDate) -> bool {
    let year = date.year();
    year >= 2000 && year <= Utc::now().year() + 1
}

fn parse_captured_date(caps: &regex::Captures, format: &str) -> Option<NaiveDate> {
    match format {
        "ymd" => {
            let year: i32 = caps.get(1)?.as_str().parse().ok()?;
            let month: u32 = caps.get(2)?.as_str().parse().ok()?;
            let day: u32 = caps.get(3)?.as_str().parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        "dmy" => {
            let day: u32 = caps.get(1)?.as_str().parse().ok()?;
            let month: u32 = caps.get(2)?.as_str().parse().ok()?;
            let year: i32 = caps.get(3)?.as_str().parse().ok()?;
            day_first(year, month, day)
        }
        "dmy_short" => {
            let day: u32 = caps.get(1)?.as_str().parse().ok()?;
            let month: u32 = caps.get(2)?.as_str().parse().ok()?;
            let year: i32 = caps.get(3)?.as_str().parse().ok()?;
            day_first(2000 + year, month, day)
        }
        _ => None,
    }
}

/// Day-first interpretation, falling back to month-first only when the
/// day-first reading is invalid (e.g. 01/19/2026).
fn day_first(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}
