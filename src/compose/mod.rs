//! Document composition: one forwarded message in, one named archive
//! document (plus optional standalone attachments) out.

pub mod embed;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::dedup;
use crate::error::Result;
use crate::extract::date;
use crate::extract::metadata::MetadataExtractor;
use crate::model::message::{Attachment, Message};
use crate::model::meta::{ExtractedMeta, ResolvedDate};
use crate::preview::ThumbnailProvider;
use crate::render::{RenderedDocument, Renderer};

use self::embed::{escape_html, insert_before_body_close, plain_text_document};

/// Stem used when sanitizing leaves nothing.
pub const FALLBACK_STEM: &str = "invoice";

/// Characters not allowed in archive file names.
const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Identity of a message, before any rendering.
#[derive(Debug, Clone)]
pub struct Identity {
    pub meta: ExtractedMeta,
    /// Which metadata heuristic matched.
    pub meta_source: &'static str,
    pub date: ResolvedDate,
    /// Which date signal was used.
    pub date_source: &'static str,
    /// Sanitized `"<YYMMDD> - <CODE> - <Sender>"`.
    pub stem: String,
}

/// A non-image attachment written next to the composed document.
#[derive(Debug, Clone)]
pub struct StandaloneFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Everything produced for one message.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub identity: Identity,
    /// The finished HTML handed to the renderer.
    pub html: String,
    pub document: RenderedDocument,
    pub standalone: Vec<StandaloneFile>,
    /// Attachments dropped as byte-identical duplicates.
    pub duplicates_dropped: usize,
}

/// Orchestrates extraction, dedup, embedding, previews and rendering.
pub struct DocumentComposer<'a> {
    extractor: &'a MetadataExtractor,
    renderer: &'a dyn Renderer,
    thumbnails: Option<&'a dyn ThumbnailProvider>,
    save_attachments: bool,
}

impl<'a> DocumentComposer<'a> {
    pub fn new(extractor: &'a MetadataExtractor, renderer: &'a dyn Renderer) -> Self {
        Self {
            extractor,
            renderer,
            thumbnails: None,
            save_attachments: true,
        }
    }

    /// Fetch thumbnails for PDF attachments through `provider`.
    pub fn with_thumbnails(mut self, provider: &'a dyn ThumbnailProvider) -> Self {
        self.thumbnails = Some(provider);
        self
    }

    /// Whether non-image attachments are also emitted standalone.
    pub fn save_attachments(mut self, save: bool) -> Self {
        self.save_attachments = save;
        self
    }

    /// Derive code, sender, date and the filename stem.
    pub fn identify(&self, message: &Message) -> Identity {
        let (meta, meta_source) = self.extractor.extract_traced(
            &message.body_text,
            &message.subject,
            &message.body_text,
        );
        let (date, date_source) = date::resolve_traced(&message.body_text, message.date);
        let stem = filename_stem(&meta, &date);
        Identity {
            meta,
            meta_source,
            date,
            date_source,
            stem,
        }
    }

    /// Build the archive document for `message`.
    ///
    /// Only a renderer failure is an error; every heuristic has a fallback.
    pub fn compose(&self, message: &Message) -> Result<ComposedDocument> {
        let identity = self.identify(message);

        let (images, others): (Vec<&Attachment>, Vec<&Attachment>) =
            message.attachments.iter().partition(|a| a.is_image());
        let images = dedup::dedupe(images);
        let others = dedup::dedupe(others);
        let duplicates_dropped = message.attachments.len() - images.len() - others.len();

        let base_html = match message.body_html.as_deref() {
            Some(html) if !html.trim().is_empty() => html.to_string(),
            _ => plain_text_document(&message.body_text),
        };
        let mut html = embed::embed(&base_html, &images);

        if !others.is_empty() {
            let sections: String = others.iter().map(|att| self.preview_section(att)).collect();
            html = insert_before_body_close(&html, &sections);
        }

        let document = self.renderer.render(&html, &identity.stem)?;

        let standalone = if self.save_attachments {
            standalone_files(&identity.stem, &others)
        } else {
            Vec::new()
        };

        info!(
            stem = %identity.stem,
            images = images.len(),
            files = others.len(),
            duplicates_dropped,
            "Composed document"
        );

        Ok(ComposedDocument {
            identity,
            html,
            document,
            standalone,
            duplicates_dropped,
        })
    }

    /// Thumbnail block for PDFs, a placeholder for everything else.
    fn preview_section(&self, att: &Attachment) -> String {
        let name = escape_html(&att.name);
        let thumbnail = if att.is_pdf() {
            self.thumbnails.and_then(|t| t.get_thumbnail(att))
        } else {
            None
        };
        debug!(name = %att.name, has_thumbnail = thumbnail.is_some(), "Preview section");

        let body = match thumbnail {
            Some(uri) => format!(
                "<img src=\"{uri}\" alt=\"{name}\" style=\"max-width:100%;border:1px solid #ccc\">"
            ),
            None => format!(
                "<p style=\"color:#666;font-style:italic\">Preview not available for {name}</p>"
            ),
        };
        format!(
            "<div style=\"page-break-before:always;margin-top:24px\">\
             <h3 style=\"font-family:sans-serif\">Attachment: {name}</h3>{body}</div>\n"
        )
    }
}

/// `sanitize("<YYMMDD> - <CODE> - <Sender>")`.
pub fn filename_stem(meta: &ExtractedMeta, date: &ResolvedDate) -> String {
    sanitize(&format!(
        "{} - {} - {}",
        date.stamp(),
        meta.business_code,
        meta.sender_name
    ))
}

/// Replace `\ / : * ? " < > |` with `_` and trim; `"invoice"` if empty.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<stem><ext>` per attachment; repeats become `<stem> (2)<ext>`, ...
fn standalone_files(stem: &str, attachments: &[&Attachment]) -> Vec<StandaloneFile> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    attachments
        .iter()
        .map(|att| {
            let ext = sanitize_extension(att.extension());
            let count = seen.entry(ext.to_lowercase()).or_insert(0);
            *count += 1;
            let file_name = if *count == 1 {
                format!("{stem}{ext}")
            } else {
                format!("{stem} ({count}){ext}")
            };
            StandaloneFile {
                file_name,
                mime_type: att.mime_type.clone(),
                bytes: att.bytes.clone(),
            }
        })
        .collect()
}

fn sanitize_extension(ext: &str) -> String {
    ext.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c) && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDate;

    use super::*;
    use crate::config::CodesConfig;
    use crate::model::data_uri::DataUri;
    use crate::render::HtmlRenderer;

    struct StubThumbnails {
        calls: Cell<usize>,
    }

    impl ThumbnailProvider for StubThumbnails {
        fn get_thumbnail(&self, _attachment: &Attachment) -> Option<DataUri> {
            self.calls.set(self.calls.get() + 1);
            Some(DataUri::encode("image/png", b"THUMB"))
        }
    }

    fn extractor() -> MetadataExtractor {
        MetadataExtractor::from_config(&CodesConfig::default())
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("231215 - DCL - A:B?"), "231215 - DCL - A_B_");
        assert_eq!(sanitize(r#"a\b/c*d"e<f>g|h"#), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize("   "), "invoice");
        assert_eq!(sanitize("  x  "), "x");
    }

    #[test]
    fn test_filename_stem() {
        let meta = ExtractedMeta {
            business_code: "TF".into(),
            sender_name: "Acme / Sons".into(),
        };
        let date = ResolvedDate(NaiveDate::from_ymd_opt(2023, 12, 15));
        assert_eq!(filename_stem(&meta, &date), "231215 - TF - Acme _ Sons");
    }

    #[test]
    fn test_compose_without_attachments_renders_body() {
        let ex = extractor();
        let composer = DocumentComposer::new(&ex, &HtmlRenderer);
        let msg = Message {
            subject: "Fwd: receipt".into(),
            body_text: "HSA Dr. Smith <clinic>\n2024-01-05".into(),
            ..Message::default()
        };
        let doc = composer.compose(&msg).unwrap();
        assert_eq!(doc.identity.stem, "240105 - HSA - Dr. Smith _clinic_");
        assert_eq!(doc.document.file_name, "240105 - HSA - Dr. Smith _clinic_.html");
        assert!(doc.html.contains("HSA Dr. Smith &lt;clinic&gt;"));
        assert!(doc.standalone.is_empty());
    }

    #[test]
    fn test_compose_dedupes_and_previews() {
        let ex = extractor();
        let thumbs = StubThumbnails { calls: Cell::new(0) };
        let composer = DocumentComposer::new(&ex, &HtmlRenderer).with_thumbnails(&thumbs);
        let msg = Message {
            subject: "TF Acme".into(),
            body_text: "see attached".into(),
            body_html: Some("<html><body><img src=\"cid:logo\"></body></html>".into()),
            attachments: vec![
                Attachment::new("logo.png", "image/png", b"L".to_vec()).with_content_id("<logo>"),
                Attachment::new("invoice.pdf", "application/pdf", b"%PDF-A".to_vec()),
                Attachment::new("invoice (1).pdf", "application/pdf", b"%PDF-A".to_vec()),
                Attachment::new("terms.docx", "application/msword", b"DOC".to_vec()),
                Attachment::new("logo-copy.png", "image/png", b"L".to_vec()),
            ],
            ..Message::default()
        };

        let doc = composer.compose(&msg).unwrap();
        assert_eq!(doc.duplicates_dropped, 2);
        assert_eq!(thumbs.calls.get(), 1);
        assert_eq!(doc.identity.meta.business_code, "TF");
        assert_eq!(doc.identity.stem, "000000 - TF - Acme");

        let html = &doc.html;
        assert!(html.contains(DataUri::encode("image/png", b"L").as_str()));
        assert!(html.contains(DataUri::encode("image/png", b"THUMB").as_str()));
        assert!(html.contains("Preview not available for terms.docx"));
        assert!(html.trim_end().ends_with("</body></html>"));

        let names: Vec<&str> = doc.standalone.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["000000 - TF - Acme.pdf", "000000 - TF - Acme.docx"]);
    }

    #[test]
    fn test_pdf_without_provider_gets_placeholder() {
        let ex = extractor();
        let composer = DocumentComposer::new(&ex, &HtmlRenderer).save_attachments(false);
        let msg = Message {
            body_text: "DCL Shop".into(),
            attachments: vec![Attachment::new("a.pdf", "application/pdf", b"1".to_vec())],
            ..Message::default()
        };
        let doc = composer.compose(&msg).unwrap();
        assert!(doc.html.contains("Preview not available for a.pdf"));
        assert!(doc.standalone.is_empty());
    }

    #[test]
    fn test_standalone_collisions() {
        let a = Attachment::new("one.pdf", "application/pdf", b"1".to_vec());
        let b = Attachment::new("two.PDF", "application/pdf", b"2".to_vec());
        let c = Attachment::new("notes", "text/plain", b"3".to_vec());
        let files = standalone_files("stem", &[&a, &b, &c]);
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["stem.pdf", "stem (2).PDF", "stem"]);
    }
}
