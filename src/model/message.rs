//! Input message and attachment types.

use chrono::{DateTime, FixedOffset};

/// A forwarded invoice or receipt email, as handed over by the mail source.
///
/// Immutable once built; every pipeline stage borrows it.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Decoded subject line.
    pub subject: String,

    /// Plain-text body (first `text/plain` part).
    pub body_text: String,

    /// HTML body (first `text/html` part), if the message has one.
    pub body_html: Option<String>,

    /// The message's own `Date:` header in the sender's offset, if it
    /// could be parsed.
    pub date: Option<DateTime<FixedOffset>>,

    /// Every attachment in message order, inline parts included.
    pub attachments: Vec<Attachment>,
}

/// A single decoded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename of the attachment. Generated if missing from the headers.
    pub name: String,

    /// MIME content type (e.g. `"image/png"`, `"application/pdf"`).
    pub mime_type: String,

    /// Content-ID for inline attachments referenced from HTML.
    /// May still carry the surrounding angle brackets.
    pub content_id: Option<String>,

    /// Decoded payload.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Build an attachment without a Content-ID.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content_id: None,
            bytes,
        }
    }

    /// Attach a Content-ID to this attachment.
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// `true` for `image/*` attachments.
    pub fn is_image(&self) -> bool {
        self.mime_type.to_ascii_lowercase().starts_with("image/")
    }

    /// `true` for PDF attachments, the only kind we request thumbnails for.
    pub fn is_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("application/pdf")
    }

    /// File extension of the original name including the dot, or `""`.
    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 && pos + 1 < self.name.len() => &self.name[pos..],
            _ => "",
        }
    }
}
