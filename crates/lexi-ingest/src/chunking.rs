//! Overlapping chunking for long documents sent to the extraction model.
//!
//! Positions are in characters, not bytes. Each cut prefers the last blank
//! line before the limit, then the last sentence end, as long as that point
//! lies past the middle of the chunk.

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 8_000;
/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 500;

/// A chunk with its character span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Trimmed chunk text.
    pub text: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// Splits text into overlapping, boundary-aware chunks.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    /// Split `text` into chunks. Text that fits in one chunk comes back whole.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total <= self.chunk_size {
            return vec![TextChunk {
                text: text.to_string(),
                chunk_index: 0,
                start_char: 0,
                end_char: total,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = self.cut_point(&chars, start);
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(TextChunk {
                    text: piece.to_string(),
                    chunk_index: chunks.len(),
                    start_char: start,
                    end_char: end,
                });
            }

            if end >= total {
                break;
            }
            let next = end.saturating_sub(self.overlap);
            // Always move forward, even with an overlap larger than the cut.
            start = if next > start { next } else { end };
        }
        chunks
    }

    fn cut_point(&self, chars: &[char], start: usize) -> usize {
        let limit = (start + self.chunk_size).min(chars.len());
        if limit >= chars.len() {
            return limit;
        }
        let midpoint = start + self.chunk_size / 2;
        let window = &chars[start..limit];

        if let Some(pos) = rfind_pair(window, '\n', '\n') {
            if start + pos > midpoint {
                return start + pos + 2;
            }
        }
        if let Some(pos) = rfind_pair(window, '.', ' ') {
            if start + pos > midpoint {
                return start + pos + 2;
            }
        }
        limit
    }
}

/// Index of the last occurrence of `a` immediately followed by `b`.
fn rfind_pair(window: &[char], a: char, b: char) -> Option<usize> {
    window.windows(2).rposition(|w| w[0] == a && w[1] == b)
}
