//! Text extraction from PDF attachments.

use crate::config::LimitsConfig;
use crate::error::ExtractionError;

/// Caps applied while extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfLimits {
    pub max_pages: usize,
    pub max_chars: usize,
}

impl Default for PdfLimits {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_chars: 3000,
        }
    }
}

impl From<&LimitsConfig> for PdfLimits {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            max_pages: limits.pdf_max_pages,
            max_chars: limits.pdf_max_chars,
        }
    }
}

/// Page-by-page access to a parsed document.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Text of the page at `index` (zero-based, document order).
    fn page_text(&self, index: usize) -> Result<String, ExtractionError>;
}

/// A PDF parsed with lopdf.
pub struct PdfDocument {
    document: lopdf::Document,
    /// 1-based page numbers in document order.
    page_numbers: Vec<u32>,
}

impl PdfDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|error| ExtractionError::Malformed(error.to_string()))?;

        // lopdf decrypts files with an empty user password while loading
        if document.is_encrypted() && document.encryption_state.is_none() {
            return Err(ExtractionError::PasswordProtected);
        }

        let page_numbers = document.get_pages().keys().copied().collect();

        Ok(Self {
            document,
            page_numbers,
        })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractionError> {
        let page_number = self
            .page_numbers
            .get(index)
            .copied()
            .ok_or_else(|| ExtractionError::Malformed(format!("no page at index {index}")))?;

        self.document
            .extract_text(&[page_number])
            .map_err(|error| ExtractionError::Malformed(error.to_string()))
    }
}

/// Parse `bytes` as a PDF and pull out capped text.
pub fn extract_pdf_text(bytes: &[u8], limits: PdfLimits) -> Result<String, ExtractionError> {
    let document = PdfDocument::parse(bytes)?;
    collect_text(&document, limits)
}

/// Concatenate page text in order, reading at most `max_pages` pages and
/// stopping once `max_chars` characters are collected. The result is cut to
/// exactly `max_chars` characters. Pages whose text can't be decoded are
/// skipped; a document that yields no visible text is `Empty`.
pub fn collect_text(source: &impl PageSource, limits: PdfLimits) -> Result<String, ExtractionError> {
    let mut text = String::new();
    let mut char_count = 0;

    for index in 0..source.page_count().min(limits.max_pages) {
        if char_count >= limits.max_chars {
            break;
        }

        match source.page_text(index) {
            Ok(page) => {
                char_count += page.chars().count();
                text.push_str(&page);
            }
            Err(error) => {
                tracing::warn!(page = index + 1, %error, "skipping unreadable pdf page");
            }
        }
    }

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }

    if char_count > limits.max_chars {
        text = text.chars().take(limits.max_chars).collect();
    }

    Ok(text)
}
