//! Extraction against real documents built with lopdf.
//!
//! Run with: cargo test --test pdf_extraction

mod common;

use relaybot::document::{PdfLimits, extract_pdf_text};
use relaybot::error::ExtractionError;

#[test]
fn reads_pages_in_order() {
    let bytes = common::pdf_bytes(&["first page", "second page"]);
    let text = extract_pdf_text(&bytes, PdfLimits::default()).unwrap();

    let first = text.find("first page").expect("first page text");
    let second = text.find("second page").expect("second page text");
    assert!(first < second);
}

#[test]
fn stops_after_five_pages() {
    let pages: Vec<String> = (1..=6).map(|n| format!("PAGE{n}MARK")).collect();
    let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
    let bytes = common::pdf_bytes(&pages);

    let text = extract_pdf_text(&bytes, PdfLimits::default()).unwrap();

    for n in 1..=5 {
        assert!(text.contains(&format!("PAGE{n}MARK")), "page {n} missing");
    }
    assert!(!text.contains("PAGE6MARK"));
}

#[test]
fn caps_long_documents_at_limit() {
    let page = "x".repeat(1500);
    let bytes = common::pdf_bytes(&[&page, &page, &page]);

    let text = extract_pdf_text(&bytes, PdfLimits::default()).unwrap();

    assert_eq!(text.chars().count(), 3000);
    assert!(text.starts_with(&page));
}

#[test]
fn blank_document_is_empty() {
    let bytes = common::pdf_bytes(&[""]);
    assert_eq!(
        extract_pdf_text(&bytes, PdfLimits::default()),
        Err(ExtractionError::Empty)
    );
}

#[test]
fn password_protected_document_is_rejected() {
    let bytes = common::encrypted_pdf_bytes(&["top secret"], "hunter2");
    assert_eq!(
        extract_pdf_text(&bytes, PdfLimits::default()),
        Err(ExtractionError::PasswordProtected)
    );
}

#[test]
fn empty_user_password_is_readable() {
    let bytes = common::encrypted_pdf_bytes(&["open to all"], "");
    let text = extract_pdf_text(&bytes, PdfLimits::default()).unwrap();
    assert!(text.contains("open to all"));
}
