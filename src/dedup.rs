//! Content-based attachment deduplication.
//!
//! Vendors resend the same PDF under different filenames, so identity is
//! the SHA-256 of the bytes alone.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::message::Attachment;

/// SHA-256 digest of an attachment's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Digest a blob. Name, MIME type and Content-ID play no part.
pub fn content_digest(bytes: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ContentDigest(hasher.finalize().into())
}

/// Keep the first attachment for every distinct byte sequence, in order.
pub fn dedupe<'a, I>(attachments: I) -> Vec<&'a Attachment>
where
    I: IntoIterator<Item = &'a Attachment>,
{
    let mut seen: HashSet<ContentDigest> = HashSet::new();
    attachments
        .into_iter()
        .filter(|att| {
            let digest = content_digest(&att.bytes);
            let first = seen.insert(digest);
            if !first {
                debug!(name = %att.name, %digest, "Dropping duplicate attachment");
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(name: &str, bytes: &[u8]) -> Attachment {
        Attachment::new(name, "application/pdf", bytes.to_vec())
    }

    #[test]
    fn test_same_bytes_different_names() {
        let list = [att("invoice.pdf", b"%PDF-1"), att("copy of invoice.pdf", b"%PDF-1")];
        let kept = dedupe(&list);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "invoice.pdf");
    }

    #[test]
    fn test_same_name_different_bytes_kept() {
        let list = [att("scan.pdf", b"one"), att("scan.pdf", b"two")];
        assert_eq!(dedupe(&list).len(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let list = [
            att("a", b"1"),
            att("b", b"2"),
            att("a-again", b"1"),
            att("c", b"3"),
            att("b-again", b"2"),
        ];
        let names: Vec<&str> = dedupe(&list).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_digest_ignores_metadata() {
        let a = att("x.pdf", b"same").with_content_id("<1>");
        let b = Attachment::new("y.png", "image/png", b"same".to_vec());
        assert_eq!(content_digest(&a.bytes), content_digest(&b.bytes));
    }

    #[test]
    fn test_digest_hex() {
        assert_eq!(
            content_digest(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe(&[] as &[Attachment]).is_empty());
    }
}
