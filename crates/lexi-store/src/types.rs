//! Data types for templates, variables, uploaded documents and draft instances.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Answer map used to fill a template: variable key to value.
///
/// Ordered so that rendering is deterministic for a given map.
pub type Answers = BTreeMap<String, serde_json::Value>;

/// Declared data type of a template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Date,
    Number,
    Currency,
    Address,
    Email,
    Phone,
    #[serde(alias = "enumerated")]
    Enum,
    /// Free text. Unknown type names coming back from the model land here too.
    #[default]
    #[serde(other)]
    String,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Date => "date",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Address => "address",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Enum => "enum",
        }
    }

    /// Parse a stored type name. Anything unrecognised is treated as `string`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "date" => Self::Date,
            "number" => Self::Number,
            "currency" => Self::Currency,
            "address" => Self::Address,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "enum" | "enumerated" => Self::Enum,
            _ => Self::String,
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named field inside a template body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// snake_case key, unique within its template.
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub example: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub dtype: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

fn default_required() -> bool {
    true
}

impl Variable {
    /// Label, or the key when the label is blank.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.key
        } else {
            &self.label
        }
    }
}

/// Accept strings, numbers and booleans for free-text fields; the model is not
/// consistent about quoting example values.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// A stored template with its ordered variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    /// Public identifier: `tpl_<slug>_<8 hex>`.
    pub template_id: String,
    pub title: String,
    pub doc_type: Option<String>,
    pub jurisdiction: Option<String>,
    pub file_description: Option<String>,
    pub similarity_tags: Vec<String>,
    pub body_md: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub variables: Vec<Variable>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// All variable keys in declaration order.
    pub fn variable_keys(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.key.as_str()).collect()
    }

    /// Compact listing entry.
    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id,
            template_id: self.template_id.clone(),
            title: self.title.clone(),
            doc_type: self.doc_type.clone(),
            jurisdiction: self.jurisdiction.clone(),
            similarity_tags: self.similarity_tags.clone(),
            variable_count: self.variables.len(),
            created_at: self.created_at,
        }
    }

    /// Text embedded for similarity search: title, description and tags.
    pub fn embedding_text(&self) -> String {
        embedding_text(
            &self.title,
            self.file_description.as_deref(),
            &self.similarity_tags,
        )
    }
}

/// Build the text used to embed a template.
pub fn embedding_text(title: &str, description: Option<&str>, tags: &[String]) -> String {
    format!("{} {} {}", title, description.unwrap_or(""), tags.join(" "))
}

/// Template listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: i64,
    pub template_id: String,
    pub title: String,
    pub doc_type: Option<String>,
    pub jurisdiction: Option<String>,
    pub similarity_tags: Vec<String>,
    pub variable_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    pub body_md: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub file_description: Option<String>,
    #[serde(default)]
    pub similarity_tags: Vec<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl NewTemplate {
    pub fn embedding_text(&self) -> String {
        embedding_text(
            &self.title,
            self.file_description.as_deref(),
            &self.similarity_tags,
        )
    }
}

/// A raw upload record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub mime: Option<String>,
    pub raw_text: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// A generated draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    /// Public id of the source template; `None` once the template is deleted.
    pub template_id: Option<String>,
    pub template_title: Option<String>,
    pub user_query: Option<String>,
    pub answers: Answers,
    pub draft_md: String,
    pub created_at: DateTime<Utc>,
}

pub const PREVIEW_CHARS: usize = 200;

impl Instance {
    /// Title shown for the draft, `Unknown` when the template is gone.
    pub fn display_title(&self) -> &str {
        self.template_title.as_deref().unwrap_or("Unknown")
    }

    /// First 200 characters of the draft, with `...` when truncated.
    pub fn preview(&self) -> String {
        truncate_chars(&self.draft_md, PREVIEW_CHARS)
    }

    /// Suggested download name: `{title_snake}_{id}.md`, `draft_{id}.md` when orphaned.
    pub fn download_filename(&self) -> String {
        let stem = self
            .template_title
            .as_deref()
            .unwrap_or("draft")
            .to_lowercase()
            .replace(' ', "_");
        let stem: String = stem
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')' | '.'))
            .collect();
        format!("{}_{}.md", stem, self.id)
    }
}

/// Truncate to `max` characters, appending `...` when anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_defaults_and_lenient_fields() {
        let var: Variable = serde_json::from_value(serde_json::json!({
            "key": "claim_amount",
            "label": "Claim Amount",
            "example": 150000,
            "dtype": "currency"
        }))
        .unwrap();
        assert!(var.required);
        assert_eq!(var.example.as_deref(), Some("150000"));
        assert_eq!(var.dtype, VariableType::Currency);
        assert!(var.description.is_none());
    }

    #[test]
    fn test_unknown_dtype_falls_back_to_string() {
        let var: Variable = serde_json::from_value(serde_json::json!({
            "key": "notes",
            "label": "Notes",
            "dtype": "paragraph"
        }))
        .unwrap();
        assert_eq!(var.dtype, VariableType::String);
        assert_eq!(VariableType::parse("enumerated"), VariableType::Enum);
        assert_eq!(VariableType::parse("weird"), VariableType::String);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    #[test]
    fn test_download_filename() {
        let mut instance = Instance {
            id: 7,
            template_id: Some("tpl_x".into()),
            template_title: Some("Incident Notice to Insurer".into()),
            user_query: None,
            answers: Answers::new(),
            draft_md: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(instance.download_filename(), "incident_notice_to_insurer_7.md");
        instance.template_title = None;
        assert_eq!(instance.download_filename(), "draft_7.md");
        assert_eq!(instance.display_title(), "Unknown");
    }
}
