//! End-to-end tests: `.eml` on disk → composed document → files on disk.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use assert_fs::prelude::*;
use predicates::prelude::*;

use receiptbox::compose::DocumentComposer;
use receiptbox::config::CodesConfig;
use receiptbox::error::Result;
use receiptbox::export::write_composed;
use receiptbox::extract::metadata::MetadataExtractor;
use receiptbox::model::data_uri::DataUri;
use receiptbox::model::message::Attachment;
use receiptbox::parser::eml::load_eml;
use receiptbox::preview::{PreviewResponse, PreviewService, Sleeper, StagedId, ThumbnailFetcher};
use receiptbox::render::HtmlRenderer;

/// Gmail-style forward: tag line, quoted headers, inline logo, the same PDF
/// twice under different names.
const FORWARDED_RECEIPT: &str = "From: Me <me@example.com>\r\n\
To: archive@example.com\r\n\
Subject: Fwd: Your Acme receipt\r\n\
Date: Mon, 08 Jan 2024 09:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/related; boundary=\"rel\"\r\n\
\r\n\
--rel\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
TF Acme Hardware\r\n\
\r\n\
---------- Forwarded message ---------\r\n\
From: Acme Billing <billing@acme.com>\r\n\
Date: Fri, Dec 15, 2023 at 10:12 AM\r\n\
Subject: Your receipt\r\n\
--alt\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>TF Acme Hardware</p><img src=\"cid:logo@acme\"></body></html>\r\n\
--alt--\r\n\
--rel\r\n\
Content-Type: image/png\r\n\
Content-ID: <logo@acme>\r\n\
Content-Disposition: inline; filename=\"logo.png\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--rel--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"receipt.pdf\"\r\n\
Content-Disposition: attachment; filename=\"receipt.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"receipt-copy.pdf\"\r\n\
Content-Disposition: attachment; filename=\"receipt-copy.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--outer--\r\n";

/// Plain-text forward without a tag line.
const UNTAGGED: &str = "From: Me <me@example.com>\r\n\
Subject: Fwd: payment confirmation\r\n\
Date: Tue, 09 Jan 2024 12:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
FYI\r\n\
\r\n\
On March 3, 2024 at 9:00 AM Stripe <receipts@stripe.com> wrote:\r\n\
> From: receipts@stripe.com\r\n\
> Amount paid: $12.00\r\n";

fn extractor() -> MetadataExtractor {
    MetadataExtractor::from_config(&CodesConfig::default())
}

#[derive(Default)]
struct InstantSleeper {
    waits: RefCell<Vec<Duration>>,
}

impl Sleeper for InstantSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

/// Thumbnail becomes available on the second lookup.
#[derive(Default)]
struct SlowPreviews {
    lookups: Cell<usize>,
    staged: RefCell<Vec<String>>,
    removed: RefCell<Vec<String>>,
}

impl PreviewService for SlowPreviews {
    fn stage(&self, attachment: &Attachment) -> Result<StagedId> {
        self.staged.borrow_mut().push(attachment.name.clone());
        Ok(StagedId(format!("staged-{}", self.staged.borrow().len())))
    }

    fn thumbnail_link(&self, _id: &StagedId) -> Result<Option<String>> {
        self.lookups.set(self.lookups.get() + 1);
        Ok((self.lookups.get() >= 2).then(|| "https://thumbs.test/t=s220".to_string()))
    }

    fn fetch(&self, url: &str) -> Result<PreviewResponse> {
        assert!(url.ends_with("=s1000"));
        Ok(PreviewResponse {
            status: 200,
            content_type: Some("image/png".into()),
            bytes: b"THUMB".to_vec(),
        })
    }

    fn remove(&self, id: &StagedId) -> Result<()> {
        self.removed.borrow_mut().push(id.0.clone());
        Ok(())
    }
}

#[test]
fn test_forwarded_receipt_end_to_end() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("receipt.eml");
    input.write_str(FORWARDED_RECEIPT).unwrap();
    let out = temp.child("out");

    let message = load_eml(input.path()).unwrap();
    let ex = extractor();
    let composer = DocumentComposer::new(&ex, &HtmlRenderer);
    let composed = composer.compose(&message).unwrap();

    // Tag line wins for metadata; the forwarded Date header gives the date.
    assert_eq!(composed.identity.stem, "231215 - TF - Acme Hardware");
    assert_eq!(composed.identity.date_source, "forwarded Date header");
    assert_eq!(composed.duplicates_dropped, 1);
    assert!(!composed.html.contains("cid:"));
    assert_eq!(composed.standalone.len(), 1);

    let written = write_composed(&composed, out.path()).unwrap();
    assert_eq!(written.attachments.len(), 1);

    out.child("231215 - TF - Acme Hardware.html")
        .assert(predicate::path::exists());
    out.child("231215 - TF - Acme Hardware.html")
        .assert(predicate::str::contains("data:image/png;base64,"));
    out.child("231215 - TF - Acme Hardware.pdf")
        .assert(predicate::path::exists());
}

#[test]
fn test_second_run_does_not_overwrite() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("receipt.eml");
    input.write_str(FORWARDED_RECEIPT).unwrap();

    let message = load_eml(input.path()).unwrap();
    let ex = extractor();
    let composed = DocumentComposer::new(&ex, &HtmlRenderer)
        .compose(&message)
        .unwrap();

    write_composed(&composed, temp.path()).unwrap();
    let again = write_composed(&composed, temp.path()).unwrap();
    assert_eq!(
        again.document,
        temp.path().join("231215 - TF - Acme Hardware_1.html")
    );
}

#[test]
fn test_untagged_plain_text_forward() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("untagged.eml");
    input.write_str(UNTAGGED).unwrap();

    let message = load_eml(input.path()).unwrap();
    assert!(message.body_html.is_none());

    let ex = extractor();
    let composed = DocumentComposer::new(&ex, &HtmlRenderer)
        .compose(&message)
        .unwrap();

    assert_eq!(composed.identity.meta.business_code, "DCL");
    assert_eq!(composed.identity.meta.sender_name, "Stripe");
    assert_eq!(composed.identity.date_source, "quoted forward marker");
    assert_eq!(composed.identity.stem, "240303 - DCL - Stripe");
    assert!(composed.html.contains("<pre"));
    assert!(composed.html.contains("Amount paid"));
}

#[test]
fn test_thumbnails_are_embedded_and_cleaned_up() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("receipt.eml");
    input.write_str(FORWARDED_RECEIPT).unwrap();
    let message = load_eml(input.path()).unwrap();

    let previews = SlowPreviews::default();
    let sleeper = InstantSleeper::default();
    let fetcher = ThumbnailFetcher::new(&previews, 1000).with_sleeper(&sleeper);

    let ex = extractor();
    let composed = DocumentComposer::new(&ex, &HtmlRenderer)
        .with_thumbnails(&fetcher)
        .compose(&message)
        .unwrap();

    // Only the surviving PDF is staged, and it is removed afterwards.
    assert_eq!(*previews.staged.borrow(), vec!["receipt.pdf".to_string()]);
    assert_eq!(*previews.removed.borrow(), vec!["staged-1".to_string()]);
    assert_eq!(
        *sleeper.waits.borrow(),
        vec![Duration::from_secs(2), Duration::from_secs(3)]
    );
    assert!(composed
        .html
        .contains(DataUri::encode("image/png", b"THUMB").as_str()));
}

#[test]
fn test_not_an_email() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("scan.pdf");
    input.write_binary(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3").unwrap();
    assert!(matches!(
        load_eml(input.path()),
        Err(receiptbox::error::ReceiptError::InvalidMessage(_))
    ));
}

#[test]
fn test_fixture_file() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("forwarded_receipt.eml");
    let message = load_eml(&fixture).unwrap();
    assert_eq!(message.subject, "Fwd: Your Acme receipt");

    let ex = extractor();
    let identity = DocumentComposer::new(&ex, &HtmlRenderer).identify(&message);
    assert_eq!(identity.meta_source, "body tag line");
    assert_eq!(identity.stem, "231215 - TF - Acme Hardware");
}

#[test]
fn test_own_date_and_forwarded_date_give_same_stem() {
    let temp = assert_fs::TempDir::new().unwrap();
    let own = temp.child("own.eml");
    own.write_str(
        "Subject: Fwd: receipt\r\n\
         Date: Fri, 15 Dec 2023 21:00:00 -0800\r\n\
         \r\n\
         TF Acme\r\n",
    )
    .unwrap();
    let forwarded = temp.child("forwarded.eml");
    forwarded
        .write_str(
            "Subject: Fwd: receipt\r\n\
             \r\n\
             TF Acme\r\n\
             Date: Fri, 15 Dec 2023 21:00:00 -0800\r\n",
        )
        .unwrap();

    let ex = extractor();
    let composer = DocumentComposer::new(&ex, &HtmlRenderer);
    let own = composer.identify(&load_eml(own.path()).unwrap());
    let forwarded = composer.identify(&load_eml(forwarded.path()).unwrap());

    assert_eq!(own.date_source, "message date");
    assert_eq!(forwarded.date_source, "forwarded Date header");
    assert_eq!(own.stem, "231215 - TF - Acme");
    assert_eq!(forwarded.stem, own.stem);
}
