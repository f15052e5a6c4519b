use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use receiptbox::compose::DocumentComposer;
use receiptbox::config::CodesConfig;
use receiptbox::extract::metadata::MetadataExtractor;
use receiptbox::render::HtmlRenderer;

fn fixture_bytes() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("forwarded_receipt.eml");
    std::fs::read(path).unwrap()
}

fn bench_parse_message(c: &mut Criterion) {
    let raw = fixture_bytes();
    c.bench_function("parse_forwarded_receipt", |b| {
        b.iter(|| receiptbox::parser::mime::parse_message(&raw))
    });
}

fn bench_compose(c: &mut Criterion) {
    let message = receiptbox::parser::mime::parse_message(&fixture_bytes());
    let extractor = MetadataExtractor::from_config(&CodesConfig::default());
    let composer = DocumentComposer::new(&extractor, &HtmlRenderer);

    c.bench_function("compose_forwarded_receipt", |b| {
        b.iter(|| composer.compose(&message).unwrap())
    });
}

criterion_group!(benches, bench_parse_message, bench_compose);
criterion_main!(benches);
