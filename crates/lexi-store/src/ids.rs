//! Public template identifiers.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const SLUG_MAX_CHARS: usize = 30;

/// Lowercase the title, drop punctuation and join words with `_`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    WHITESPACE.replace_all(stripped.trim(), "_").into_owned()
}

/// Build `tpl_{slug}_{8 hex}` with the slug capped at 30 characters.
pub fn generate_template_id(title: &str) -> String {
    let slug: String = slugify(title).chars().take(SLUG_MAX_CHARS).collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("tpl_{}_{}", slug, &suffix[..8])
}
