//! Inline image resolution: `cid:` references become `data:` URIs.
//!
//! Content-IDs rarely match filenames exactly (`image001.png@01D9...` vs
//! `image001.png`), so matching is by substring in either direction, with a
//! first-unused fallback. Images that no reference claimed are appended so
//! every attached image ends up visible.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::model::data_uri::DataUri;
use crate::model::message::Attachment;

static CID_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src\s*=\s*(?:"cid:([^"]*)"|'cid:([^']*)')"#).expect("valid regex")
});

/// One image available to a single embedding pass.
struct Candidate<'a> {
    name: &'a str,
    keys: Vec<String>,
    data_uri: DataUri,
    used: bool,
}

/// Per-call matching state. Never outlives [`embed`].
struct EmbedPass<'a> {
    candidates: Vec<Candidate<'a>>,
}

impl<'a> EmbedPass<'a> {
    fn new(images: &[&'a Attachment]) -> Self {
        let candidates = images
            .iter()
            .map(|img| Candidate {
                name: &img.name,
                keys: name_keys(&img.name),
                data_uri: DataUri::encode(&img.mime_type, &img.bytes),
                used: false,
            })
            .collect();
        Self { candidates }
    }

    /// Claim an image for a CID: first filename match, else first unused.
    fn claim(&mut self, raw_cid: &str) -> Option<&Candidate<'a>> {
        let cid = normalize_cid(raw_cid);
        let by_name = (!cid.is_empty())
            .then(|| {
                self.candidates.iter().position(|c| {
                    c.keys
                        .iter()
                        .any(|k| cid.contains(k.as_str()) || k.contains(cid.as_str()))
                })
            })
            .flatten();
        let idx = by_name.or_else(|| self.candidates.iter().position(|c| !c.used))?;

        let candidate = &mut self.candidates[idx];
        candidate.used = true;
        debug!(
            cid = %cid,
            image = candidate.name,
            by_name = by_name.is_some(),
            "Resolved cid reference"
        );
        Some(&*candidate)
    }

    fn unused(&self) -> impl Iterator<Item = &Candidate<'a>> {
        self.candidates.iter().filter(|c| !c.used)
    }
}

/// Replace `cid:` image sources with data URIs and append unclaimed images.
///
/// Returns `html` unchanged when it is empty or there are no images.
pub fn embed(html: &str, images: &[&Attachment]) -> String {
    if html.trim().is_empty() || images.is_empty() {
        return html.to_string();
    }

    let mut pass = EmbedPass::new(images);

    let replaced = CID_SRC.replace_all(html, |caps: &Captures<'_>| {
        let cid = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        match pass.claim(cid) {
            Some(c) => format!("src=\"{}\"", c.data_uri),
            None => caps[0].to_string(),
        }
    });

    let appendix: String = pass
        .unused()
        .map(|c| {
            format!(
                "<div style=\"margin:16px 0\"><img src=\"{}\" alt=\"{}\" style=\"max-width:100%\"></div>\n",
                c.data_uri,
                escape_html(c.name)
            )
        })
        .collect();

    if appendix.is_empty() {
        return replaced.into_owned();
    }
    insert_before_body_close(&replaced, &appendix)
}

/// Wrap plain text as a minimal HTML document.
pub fn plain_text_document(text: &str) -> String {
    format!(
        "<html><body><pre style=\"white-space:pre-wrap;font-family:inherit\">{}</pre></body></html>",
        escape_html(text)
    )
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Insert `fragment` before the last `</body>`, or append it.
pub(crate) fn insert_before_body_close(html: &str, fragment: &str) -> String {
    // ASCII lower-casing keeps byte offsets aligned with the original.
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(&html[..pos]);
            out.push_str(fragment);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{fragment}"),
    }
}

/// `<Image001.PNG@01D9>` → `image001.png@01d9`.
fn normalize_cid(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_lowercase()
}

/// Lower-cased filename variants: full name, stem, and both without dots.
fn name_keys(name: &str) -> Vec<String> {
    let full = name.trim().to_lowercase();
    let stem = match full.rfind('.') {
        Some(pos) if pos > 0 => full[..pos].to_string(),
        _ => full.clone(),
    };
    let mut keys = Vec::with_capacity(4);
    for key in [full.replace('.', ""), stem.replace('.', ""), full, stem] {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
