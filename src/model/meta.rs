//! Identity derived from a message: business code, sender, transaction date.

use chrono::{Datelike, NaiveDate};

/// Sender name used when no heuristic finds one.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Business code and sender name extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtractedMeta {
    /// One of the configured whitelist codes, or the default code.
    pub business_code: String,
    /// Free text, never empty.
    pub sender_name: String,
}

/// The resolved transaction date. Only the calendar date matters.
///
/// Serializes as an ISO date string, or `null` when none was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ResolvedDate(pub Option<NaiveDate>);

impl ResolvedDate {
    /// Format as a 6-digit `YYMMDD` stamp, `000000` when no date was found.
    pub fn stamp(&self) -> String {
        match self.0 {
            Some(d) => format!(
                "{:02}{:02}{:02}",
                d.year().rem_euclid(100),
                d.month(),
                d.day()
            ),
            None => "000000".to_string(),
        }
    }
}

impl std::fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_zero_padded() {
        let d = ResolvedDate(NaiveDate::from_ymd_opt(2024, 3, 7));
        assert_eq!(d.stamp(), "240307");
    }

    #[test]
    fn test_stamp_missing() {
        assert_eq!(ResolvedDate(None).stamp(), "000000");
    }

    #[test]
    fn test_serializes_as_iso_date() {
        let d = ResolvedDate(NaiveDate::from_ymd_opt(2023, 12, 15));
        assert_eq!(serde_json::to_string(&d).unwrap(), r#""2023-12-15""#);
        assert_eq!(serde_json::to_string(&ResolvedDate(None)).unwrap(), "null");
    }

    #[test]
    fn test_stamp_century_boundary() {
        let d = ResolvedDate(NaiveDate::from_ymd_opt(2000, 12, 31));
        assert_eq!(d.to_string(), "001231");
    }
}
