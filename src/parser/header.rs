//! Header-value helpers: byte decoding and lenient calendar-date parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Full date-time layouts seen in forwarded `Date:` lines, tried after the
/// RFC 2822 / RFC 3339 parsers.
const DATETIME_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Date-only layouts. `%b` also accepts full month names when parsing.
const DATE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

/// Decode raw text bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_text_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Parse the calendar date out of a header-ish date string.
///
/// Accepts RFC 2822, RFC 3339, the Gmail forward style (`"Dec 15, 2023"`),
/// and a handful of numeric layouts. A leading day-of-week is ignored.
/// Returns `None` for anything that does not name a real calendar day.
pub fn parse_calendar_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim().trim_end_matches('.').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    let candidate = strip_timezone_name(strip_day_of_week(trimmed));

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.date_naive());
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
            return Some(ndt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
            return Some(d);
        }
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Strip a leading day-of-week prefix (`"Thu, "`, `"Thursday "`).
pub fn strip_day_of_week(s: &str) -> &str {
    const DAYS: &[&str] = &[
        "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "Mon",
        "Tue", "Wed", "Thu", "Fri", "Sat", "Sun",
    ];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim_start();
            }
        }
    }
    s
}

/// Drop a trailing alphabetic zone name (`"GMT"`, `"PST"`, `"(UTC)"`).
/// Only the calendar day is needed, so the offset is irrelevant.
fn strip_timezone_name(s: &str) -> &str {
    let Some((head, last)) = s.rsplit_once(' ') else {
        return s;
    };
    let bare = last.trim_matches(|c| c == '(' || c == ')');
    let is_zone = !bare.is_empty()
        && bare.len() <= 5
        && bare != "AM"
        && bare != "PM"
        && bare.chars().all(|c| c.is_ascii_uppercase());
    if is_zone {
        head.trim_end()
    } else {
        s
    }
}
