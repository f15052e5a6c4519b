//! Transaction date resolution.
//!
//! A forwarded receipt carries several dates: whatever the forwarder typed,
//! the quoted "On ... wrote:" marker, the forwarded `Date:` header, and the
//! forward's own date. They are tried in that order.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use tracing::debug;

use crate::extract::{first_match, Strategy};
use crate::model::meta::ResolvedDate;
use crate::parser::header::parse_calendar_date;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));

/// Exactly six digits, not part of a longer number.
static SIX_DIGITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{2})([0-9]{2})([0-9]{2})(?:[^0-9]|$)").expect("valid regex")
});

static QUOTED_FORWARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"On\s+((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4})[\s\S]*?wrote:",
    )
    .expect("valid regex")
});

static FORWARDED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t>*]*Date:\*?[ \t]*(\S.*?)[ \t\r]*$").expect("valid regex")
});

/// Gmail appends the time as `"... at 10:12 AM"`.
static AT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+at\s+.*$").expect("valid regex"));

/// Resolve the transaction date of a forwarded message.
pub fn resolve(body_text: &str, fallback_date: Option<DateTime<FixedOffset>>) -> ResolvedDate {
    resolve_traced(body_text, fallback_date).0
}

/// Like [`resolve`], also naming the signal that produced the date.
///
/// Every strategy yields the calendar day local to its source; the message
/// date is read in its own offset, never converted to UTC.
pub fn resolve_traced(
    body_text: &str,
    fallback_date: Option<DateTime<FixedOffset>>,
) -> (ResolvedDate, &'static str) {
    let chain = [
        Strategy::new("ISO date in body", || iso_date(body_text)),
        Strategy::new("YYMMDD in body", || six_digit_date(body_text)),
        Strategy::new("quoted forward marker", || quoted_forward_date(body_text)),
        Strategy::new("forwarded Date header", || forwarded_header_date(body_text)),
        Strategy::new("message date", || fallback_date.map(|d| d.date_naive())),
    ];

    match first_match(&chain) {
        Some((source, date)) => {
            debug!(%date, source, "Resolved transaction date");
            (ResolvedDate(Some(date)), source)
        }
        None => {
            debug!("No transaction date found");
            (ResolvedDate(None), "none")
        }
    }
}

/// First `YYYY-MM-DD` in the text.
fn iso_date(text: &str) -> Option<NaiveDate> {
    let caps = ISO_DATE.captures(text)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

/// First bare six-digit run, read as `YYMMDD` in the 2000s.
fn six_digit_date(text: &str) -> Option<NaiveDate> {
    let caps = SIX_DIGITS.captures(text)?;
    let year = format!("20{}", &caps[1]);
    ymd(&year, &caps[2], &caps[3])
}

/// `On March 3, 2024 at 9:00 AM Vendor <x@y> wrote:`
fn quoted_forward_date(text: &str) -> Option<NaiveDate> {
    let caps = QUOTED_FORWARD.captures(text)?;
    let normalized = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDate::parse_from_str(&normalized, "%B %d, %Y").ok()
}

/// First forwarded `Date:` line, minus any trailing `at ...` clause.
fn forwarded_header_date(text: &str) -> Option<NaiveDate> {
    let caps = FORWARDED_DATE.captures(text)?;
    let value = AT_CLAUSE.replace(&caps[1], "");
    parse_calendar_date(&value)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
