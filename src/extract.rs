//! Text extraction for uploaded documents.
//!
//! Two formats are supported: PDF (via `pdf-extract`) and plain UTF-8 text.
//! The format is decided by content sniffing (a leading `%PDF-` magic marks
//! a PDF), with the filename extension as a fallback hint for files served
//! without their header intact.

use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while pulling raw text out of a document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The PDF parser rejected the document.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The document is neither a PDF nor valid UTF-8 text.
    #[error("unsupported document format for '{0}'")]
    Unsupported(String),
    /// Extraction succeeded but produced no text.
    #[error("no text could be extracted from '{0}'")]
    Empty(String),
}

/// Extract plain text from raw document bytes.
///
/// Returns [`ExtractError::Empty`] when a document parses but yields only
/// whitespace, so callers never index an empty body.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let text = if is_pdf(bytes, filename) {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| ExtractError::Pdf(err.to_string()))?
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractError::Unsupported(filename.to_string()))?
    };

    if text.trim().is_empty() {
        return Err(ExtractError::Empty(filename.to_string()));
    }
    Ok(text)
}

fn is_pdf(bytes: &[u8], filename: &str) -> bool {
    bytes.starts_with(PDF_MAGIC)
        || filename
            .rsplit('.')
            .next()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text("study notes on osmosis".as_bytes(), "notes.txt")
            .expect("plain text extraction");
        assert_eq!(text, "study notes on osmosis");
    }

    #[test]
    fn binary_content_is_rejected() {
        let error = extract_text(&[0xff, 0xfe, 0x00, 0x01], "mystery.bin").unwrap_err();
        assert!(matches!(error, ExtractError::Unsupported(name) if name == "mystery.bin"));
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        let error = extract_text(b"   \n\t  ", "blank.txt").unwrap_err();
        assert!(matches!(error, ExtractError::Empty(_)));
    }

    #[test]
    fn truncated_pdf_reports_parser_error() {
        let error = extract_text(b"%PDF-1.7 not actually a pdf", "intro.pdf").unwrap_err();
        assert!(matches!(error, ExtractError::Pdf(_)));
    }

    #[test]
    fn pdf_extension_forces_pdf_parsing() {
        // No magic header, but the extension says PDF; the parser should be the
        // one to reject it rather than the UTF-8 path accepting it as text.
        let error = extract_text(b"plain body", "lecture.PDF").unwrap_err();
        assert!(matches!(error, ExtractError::Pdf(_)));
    }
}
