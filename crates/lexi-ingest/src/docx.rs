//! Word (.docx) text extraction.
//!
//! Reads `word/document.xml` from the OOXML zip container. Body paragraphs
//! come first, then each table row as its non-empty cells joined with ` | `.

use std::io::{Cursor, Read};

use lexi_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:tbl>.*?</w:tbl>").unwrap());
static ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:tr(?:\s[^>]*)?>.*?</w:tr>").unwrap());
static CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:tc(?:\s[^>]*)?>.*?</w:tc>").unwrap());
// Self-closing `<w:p/>` is an empty paragraph and must not open a match.
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*[^/>])?>.*?</w:p>").unwrap());
static RUN_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>").unwrap()
});
static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract plain text from .docx bytes.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let xml = read_document_xml(bytes)?;
    Ok(document_text(&xml))
}

fn read_document_xml(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Extraction(format!("Invalid DOCX file: {}", e)))?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| Error::Extraction(format!("DOCX file has no {}", DOCUMENT_PART)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| Error::Extraction(format!("Failed to read {}: {}", DOCUMENT_PART, e)))?;
    Ok(xml)
}

/// Convert WordprocessingML to text.
pub fn document_text(xml: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();

    let body_without_tables = TABLE.replace_all(xml, "");
    for para in PARAGRAPH.find_iter(&body_without_tables) {
        let text = paragraph_text(para.as_str());
        let text = text.trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
    }

    for table in TABLE.find_iter(xml) {
        for row in ROW.find_iter(table.as_str()) {
            let cells: Vec<String> = CELL
                .find_iter(row.as_str())
                .map(|cell| cell_text(cell.as_str()))
                .filter(|text| !text.is_empty())
                .collect();
            if !cells.is_empty() {
                blocks.push(cells.join(" | "));
            }
        }
    }

    blocks.join("\n\n")
}

fn cell_text(cell_xml: &str) -> String {
    PARAGRAPH
        .find_iter(cell_xml)
        .map(|p| paragraph_text(p.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn paragraph_text(para_xml: &str) -> String {
    let mut out = String::new();
    for caps in RUN_TOKEN.captures_iter(para_xml) {
        match caps.get(1) {
            Some(text) => out.push_str(&unescape_xml(text.as_str())),
            None if caps[0].starts_with("<w:tab") => out.push('\t'),
            None => out.push('\n'),
        }
    }
    out
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
