//! Lexi Ingest — text extraction from uploaded documents and chunking for long texts.

pub mod chunking;
pub mod docx;
pub mod file;
pub mod pdf;

pub use chunking::{TextChunk, TextChunker};
pub use file::{extract_text, text_preview, ExtractedText, FileType};
