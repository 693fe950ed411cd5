//! Parsing structured output from model completions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use lexi_core::Error;

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Outcome of parsing a model reply: the value, or why it could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    Parsed(T),
    Malformed { error: String },
}

impl<T> ModelOutput<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Malformed { .. } => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Treat a malformed reply as a fatal [`Error::ModelOutput`].
    pub fn into_result(self) -> lexi_core::Result<T> {
        match self {
            Self::Parsed(value) => Ok(value),
            Self::Malformed { error } => Err(Error::ModelOutput(error)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ModelOutput<U> {
        match self {
            Self::Parsed(value) => ModelOutput::Parsed(f(value)),
            Self::Malformed { error } => ModelOutput::Malformed { error },
        }
    }
}

/// Remove a surrounding Markdown code fence (```json or ```) and trim.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a model reply as JSON into `T`.
///
/// Fences are stripped first. When the direct parse fails, trailing commas
/// before `}` or `]` are removed and the parse is tried once more.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> ModelOutput<T> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<T>(cleaned) {
        Ok(value) => ModelOutput::Parsed(value),
        Err(first) => {
            let repaired = TRAILING_COMMA.replace_all(cleaned, "$1");
            match serde_json::from_str::<T>(&repaired) {
                Ok(value) => ModelOutput::Parsed(value),
                Err(_) => ModelOutput::Malformed {
                    error: first.to_string(),
                },
            }
        }
    }
}
