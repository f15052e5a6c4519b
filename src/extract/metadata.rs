//! Business code and sender name extraction.
//!
//! The forwarder types a tag line such as `TF Acme Ltd` as the first line of
//! the forwarded body (or as the subject). When there is none, the sender is
//! recovered from the quoted `From:` header and the default code is used.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::CodesConfig;
use crate::extract::{first_match, Strategy};
use crate::model::address::SenderAddress;
use crate::model::meta::{ExtractedMeta, UNKNOWN_SENDER};

/// A `From:` line inside a forwarded body, tolerating quote markers and
/// the `*From:*` bolding some clients emit in plain text.
static FORWARDED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t>*]*From:\*?[ \t]*(\S.*?)[ \t\r]*$").expect("valid regex")
});

/// Derives [`ExtractedMeta`] against a fixed whitelist of business codes.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    whitelist: Vec<String>,
    default_code: String,
}

impl MetadataExtractor {
    /// Build an extractor for the given codes. Codes compare case-sensitively.
    pub fn new<I, S>(whitelist: I, default_code: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            default_code: default_code.into(),
        }
    }

    /// Build an extractor from the `[codes]` config section.
    pub fn from_config(codes: &CodesConfig) -> Self {
        Self::new(codes.whitelist.iter().cloned(), codes.default_code.clone())
    }

    /// The code used when no tag line is found.
    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    /// Extract `{business_code, sender_name}`.
    ///
    /// `forwarded_headers` is the text searched for a quoted `From:` line;
    /// usually the plain-text body itself.
    pub fn extract(&self, body_text: &str, subject: &str, forwarded_headers: &str) -> ExtractedMeta {
        self.extract_traced(body_text, subject, forwarded_headers).0
    }

    /// Like [`extract`](Self::extract), also naming the strategy that matched.
    pub fn extract_traced(
        &self,
        body_text: &str,
        subject: &str,
        forwarded_headers: &str,
    ) -> (ExtractedMeta, &'static str) {
        let chain = [
            Strategy::new("body tag line", || {
                self.parse_tag_line(first_non_blank_line(body_text)?)
            }),
            Strategy::new("subject tag line", || self.parse_tag_line(subject)),
            Strategy::new("forwarded From header", || {
                self.with_default_code(forwarded_sender(forwarded_headers)?)
            }),
        ];

        let (source, meta) = first_match(&chain).unwrap_or_else(|| {
            (
                "unknown sender",
                ExtractedMeta {
                    business_code: self.default_code.clone(),
                    sender_name: UNKNOWN_SENDER.to_string(),
                },
            )
        });

        debug!(
            code = %meta.business_code,
            sender = %meta.sender_name,
            source,
            "Extracted metadata"
        );
        (meta, source)
    }

    /// Parse `<CODE> <sender words...>`. The code must be whitelisted and a
    /// sender must follow it.
    fn parse_tag_line(&self, line: &str) -> Option<ExtractedMeta> {
        let mut tokens = line.split_whitespace();
        let code = tokens.next()?;
        if !self.whitelist.iter().any(|c| c == code) {
            return None;
        }
        let sender = tokens.collect::<Vec<_>>().join(" ");
        if sender.is_empty() {
            return None;
        }
        Some(ExtractedMeta {
            business_code: code.to_string(),
            sender_name: sender,
        })
    }

    fn with_default_code(&self, sender_name: String) -> Option<ExtractedMeta> {
        Some(ExtractedMeta {
            business_code: self.default_code.clone(),
            sender_name,
        })
    }
}

/// The first line that contains anything but whitespace.
fn first_non_blank_line(text: &str) -> Option<&str> {
    text.lines().find(|l| !l.trim().is_empty())
}

/// Sender from the first forwarded `From:` line: the display name when one
/// precedes an angle-bracketed address, otherwise the title-cased domain.
fn forwarded_sender(text: &str) -> Option<String> {
    let value = FORWARDED_FROM.captures(text)?.get(1)?.as_str();
    let addr = SenderAddress::parse(value);
    addr.sender_name()
        .or_else(|| Some(value.trim().to_string()))
        .filter(|s| !s.is_empty())
}
