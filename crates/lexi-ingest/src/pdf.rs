//! PDF text extraction.

use lexi_core::{Error, Result};
use pdf_extract::extract_text_from_mem;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into the file the `%PDF-` header may start.
const HEADER_WINDOW: usize = 1024;

/// Whether `%PDF-` starts within the first kilobyte.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let end = bytes.len().min(HEADER_WINDOW + PDF_MAGIC.len() - 1);
    let window = &bytes[..end];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Extract the text of every page, trimmed, joined with blank lines.
///
/// Pages are separated by the form feeds `pdf-extract` emits between them;
/// blank pages are dropped.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    if !has_pdf_header(bytes) {
        return Err(Error::Extraction("File is not a valid PDF".into()));
    }

    let raw = extract_text_from_mem(bytes)
        .map_err(|e| Error::Extraction(format!("Failed to read PDF: {}", e)))?;

    let pages: Vec<&str> = raw
        .split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect();
    Ok(pages.join("\n\n"))
}
