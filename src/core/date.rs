//! Permissive date parsing for noisy bank exports and hand-written tables.
//!
//! Accepted inputs, tried in order:
//! - epoch milliseconds (10 or more digits, optionally negative)
//! - RFC 3339 and RFC 2822 timestamps
//! - `YYYY-MM-DD` / `DD-MM-YYYY` (or `/`-separated) with an optional time
//!   using `:` or `_` separators and 1-2 digit hours
//! - natural language: `now`, `today`, `yesterday`, `tomorrow`, and
//!   month-name forms such as `March 5, 2024` or `5th Mar 2024`
//!
//! Naive dates and times are interpreted as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{1,4})[-/](\d{1,2})[-/](\d{1,4})(?:(?:\s+|T|_)(\d{1,2})[:_](\d{2})(?:[:_](\d{2})(?:\.(\d{1,9}))?)?)?\s*(?:Z|z|UTC|utc)?$",
    )
    .expect("numeric date pattern is valid")
});

static ORDINAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal pattern is valid")
});

const MONTH_NAME_FORMATS: [&str; 6] = [
    "%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y", "%Y %B %d", "%Y %b %d",
];
const TIME_SUFFIXES: [&str; 2] = [" %H:%M", " %H:%M:%S"];

/// Parses `raw` into epoch milliseconds, or `None` when no format matches.
///
/// `now` anchors the relative keywords so the function stays deterministic.
pub fn parse_date(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.len() >= 10 && digits.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse::<i64>().ok();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp_millis());
    }

    if let Some(dt) = parse_numeric(raw) {
        return Some(dt.and_utc().timestamp_millis());
    }

    parse_natural(raw, now)
}

fn parse_numeric(raw: &str) -> Option<NaiveDateTime> {
    let caps = NUMERIC_DATE.captures(raw)?;
    let (first, month, last) = (&caps[1], &caps[2], &caps[3]);

    let (year, day) = if first.len() == 4 {
        (first, last)
    } else if last.len() == 4 {
        (last, first)
    } else {
        return None;
    };

    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;

    let time = match caps.get(4) {
        Some(hour) => {
            let minute: u32 = caps[5].parse().ok()?;
            let second: u32 = caps.get(6).map_or(Some(0), |s| s.as_str().parse().ok())?;
            let nanos: u32 = caps
                .get(7)
                .map_or(Some(0), |f| format!("{:0<9}", f.as_str()).parse().ok())?;
            NaiveTime::from_hms_nano_opt(hour.as_str().parse().ok()?, minute, second, nanos)?
        }
        None => NaiveTime::MIN,
    };

    Some(date.and_time(time))
}

fn parse_natural(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    let lower = raw.to_lowercase();
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

    match lower.as_str() {
        "now" => return Some(now.timestamp_millis()),
        "today" => return Some(midnight.timestamp_millis()),
        "yesterday" => return Some((midnight - Duration::days(1)).timestamp_millis()),
        "tomorrow" => return Some((midnight + Duration::days(1)).timestamp_millis()),
        _ => {}
    }

    let without_ordinals = ORDINAL_SUFFIX.replace_all(raw, "$1");
    let cleaned = without_ordinals
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    for format in MONTH_NAME_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
        }
        for suffix in TIME_SUFFIXES {
            let with_time = format!("{format}{suffix}");
            if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, &with_time) {
                return Some(dt.and_utc().timestamp_millis());
            }
        }
    }

    None
}
