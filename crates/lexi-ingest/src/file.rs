//! File type detection and dispatch to the format extractors.

use lexi_core::{Error, Result};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";

/// Default preview length for upload responses.
pub const PREVIEW_CHARS: usize = 500;

/// Supported upload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Docx,
    Pdf,
    Unknown,
}

impl FileType {
    /// Detect file type from extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "docx" => Self::Docx,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    pub fn mime(&self) -> Option<&'static str> {
        match self {
            Self::Docx => Some(DOCX_MIME),
            Self::Pdf => Some(PDF_MIME),
            Self::Unknown => None,
        }
    }
}

/// Text pulled out of an upload.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub mime: &'static str,
}

/// Extract plain text from raw file bytes, dispatching on the filename extension.
///
/// Paragraphs (and PDF pages) are joined with blank lines. The result may be
/// empty; callers decide whether that is an error.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<ExtractedText> {
    let file_type = FileType::from_filename(filename);
    let text = match file_type {
        FileType::Docx => crate::docx::extract_docx(bytes)?,
        FileType::Pdf => crate::pdf::extract_pdf(bytes)?,
        FileType::Unknown => {
            return Err(Error::Validation(format!(
                "Unsupported file type: {}",
                filename
            )))
        }
    };
    tracing::debug!("Extracted {} chars from {}", text.chars().count(), filename);
    Ok(ExtractedText {
        text,
        mime: file_type.mime().unwrap_or("application/octet-stream"),
    })
}

/// First `max` characters of `text`, with `...` appended when truncated.
pub fn text_preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("Notice.DOCX"), FileType::Docx);
        assert_eq!(FileType::from_filename("scan.final.pdf"), FileType::Pdf);
        assert_eq!(FileType::from_filename("notes.txt"), FileType::Unknown);
        assert_eq!(FileType::from_filename("README"), FileType::Unknown);
        assert_eq!(FileType::from_extension(".pdf"), FileType::Pdf);
    }

    #[test]
    fn test_unsupported_type_is_validation_error() {
        let err = extract_text(b"hello", "notes.txt").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("abc", 500), "abc");
        let long = "x".repeat(600);
        let preview = text_preview(&long, PREVIEW_CHARS);
        assert_eq!(preview.len(), 503);
        assert!(preview.ends_with("..."));
    }
}
