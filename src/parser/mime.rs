//! MIME message decoding into a [`Message`].

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::model::message::{Attachment, Message};
use crate::parser::header::decode_text_bytes;

/// Parse a complete raw message (headers + body) into a [`Message`].
///
/// Uses `mail-parser` internally. When the bytes cannot be parsed at all,
/// everything after the first blank line becomes the plain-text body so
/// the pipeline still has something to work with.
pub fn parse_message(raw_message: &[u8]) -> Message {
    let message_bytes = skip_from_line(raw_message);

    let Some(msg) = MessageParser::default().parse(message_bytes) else {
        warn!("mail-parser rejected message, using raw body fallback");
        return Message {
            body_text: extract_body_fallback(message_bytes),
            ..Message::default()
        };
    };

    let subject = msg.subject().unwrap_or_default().trim().to_string();
    let body_text = msg
        .body_text(0)
        .map(Cow::into_owned)
        .unwrap_or_default();

    // mail-parser synthesizes HTML from text-only messages; keep real HTML only.
    let body_html = msg
        .html_part(0)
        .filter(|part| matches!(part.body, PartType::Html(_)))
        .and_then(|_| msg.body_html(0))
        .map(Cow::into_owned);

    let date = msg.date().and_then(header_date);

    let attachments = msg
        .attachments()
        .enumerate()
        .map(|(idx, part)| attachment_from_part(idx, part))
        .collect::<Vec<_>>();

    debug!(
        subject = %subject,
        attachments = attachments.len(),
        has_html = body_html.is_some(),
        "Parsed message"
    );

    Message {
        subject,
        body_text,
        body_html,
        date,
        attachments,
    }
}

/// Build an [`Attachment`] from a decoded MIME part.
fn attachment_from_part(idx: usize, part: &mail_parser::MessagePart<'_>) -> Attachment {
    let mime_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
        .to_ascii_lowercase();

    let name = part
        .attachment_name()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| generated_name(idx, &mime_type));

    Attachment {
        name,
        mime_type,
        content_id: part.content_id().map(String::from),
        bytes: part.contents().to_vec(),
    }
}

/// The `Date:` header as an instant in the sender's own offset, so the
/// calendar day matches what the sender saw.
fn header_date(d: &mail_parser::DateTime) -> Option<DateTime<FixedOffset>> {
    let secs = i32::from(d.tz_hour) * 3600 + i32::from(d.tz_minute) * 60;
    let offset = if d.tz_before_gmt {
        FixedOffset::west_opt(secs)
    } else {
        FixedOffset::east_opt(secs)
    }?;
    DateTime::from_timestamp(d.to_timestamp(), 0).map(|utc| utc.with_timezone(&offset))
}

/// `attachment_<n>` with an extension guessed from the MIME type.
fn generated_name(idx: usize, mime_type: &str) -> String {
    match mime_guess::get_mime_extensions_str(mime_type).and_then(|exts| exts.first()) {
        Some(ext) => format!("attachment_{idx}.{ext}"),
        None => format!("attachment_{idx}"),
    }
}

/// Skip an mbox-style `From ` separator line if the file starts with one.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Fallback body extraction when `mail-parser` cannot parse the message.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = decode_text_bytes(data);
    if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        text
    }
}
