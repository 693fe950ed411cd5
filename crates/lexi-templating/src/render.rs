//! Placeholder substitution.
//!
//! `{{key}}` tokens are replaced with answer values; anything left over
//! becomes a visible `[MISSING: key]` marker. Rendering never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use lexi_store::Answers;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// String form of an answer: strings verbatim, `null` empty, anything else as JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Fill `body` with `answers` and mark unresolved placeholders.
pub fn render(body: &str, answers: &Answers) -> String {
    let mut draft = body.to_string();
    for (key, value) in answers {
        let token = format!("{{{{{}}}}}", key);
        if draft.contains(&token) {
            draft = draft.replace(&token, &value_to_string(value));
        }
    }
    PLACEHOLDER
        .replace_all(&draft, "[MISSING: ${1}]")
        .into_owned()
}

/// Distinct placeholder keys in `body`, in order of first appearance.
pub fn placeholder_keys(body: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(body) {
        let key = &caps[1];
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}
