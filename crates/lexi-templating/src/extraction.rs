//! Variable extraction from document text, chunked for long documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use lexi_core::Result;
use lexi_ingest::TextChunker;
use lexi_llm::{prompts, CompletionBackend, ModelOutput, DEFAULT_MAX_TOKENS};
use lexi_store::Variable;

/// Documents longer than this (in characters) are extracted chunk by chunk.
pub const CHUNKING_THRESHOLD: usize = 10_000;

/// Output budget for template body generation, which echoes the whole document.
pub const BODY_MAX_TOKENS: u32 = 8192;

/// Suggested template metadata and variables for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    pub file_description: Option<String>,
    pub similarity_tags: Vec<String>,
    pub variables: Vec<Variable>,
}

/// Reply shape of the extraction prompts. Every field is optional; the model
/// sends `null` as often as it omits a field.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    doc_type: Option<String>,
    #[serde(default)]
    file_description: Option<String>,
    #[serde(default)]
    similarity_tags: Option<Vec<Value>>,
    #[serde(default)]
    variables: Option<Vec<Value>>,
}

impl RawExtraction {
    fn tags(&self) -> Vec<String> {
        self.similarity_tags
            .iter()
            .flatten()
            .filter_map(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Variables that deserialize and carry a key; the rest are dropped.
    fn variables(&self) -> Vec<Variable> {
        self.variables
            .iter()
            .flatten()
            .filter_map(|raw| match serde_json::from_value::<Variable>(raw.clone()) {
                Ok(var) if !var.key.trim().is_empty() => Some(var),
                Ok(_) => None,
                Err(e) => {
                    debug!("Dropping unreadable variable {}: {}", raw, e);
                    None
                }
            })
            .collect()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Append `incoming` to `merged`, keeping the first variable seen for each key.
pub fn merge_variables(merged: &mut Vec<Variable>, incoming: impl IntoIterator<Item = Variable>) {
    for var in incoming {
        if !merged.iter().any(|existing| existing.key == var.key) {
            merged.push(var);
        }
    }
}

/// Runs the extraction prompts against a completion backend.
pub struct VariableExtractor<'a> {
    backend: &'a dyn CompletionBackend,
    chunker: TextChunker,
    threshold: usize,
}

impl<'a> VariableExtractor<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self {
            backend,
            chunker: TextChunker::default(),
            threshold: CHUNKING_THRESHOLD,
        }
    }

    /// Override the chunking threshold and chunk geometry.
    pub fn with_chunking(mut self, threshold: usize, chunker: TextChunker) -> Self {
        self.threshold = threshold;
        self.chunker = chunker;
        self
    }

    /// Extract metadata and variables from `text`.
    ///
    /// Short documents go out in one call and an unreadable reply is an
    /// error. Long documents go out in chunks; an unreadable chunk reply is
    /// skipped. Upstream failures are returned in both cases.
    pub async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        if text.chars().count() > self.threshold {
            self.extract_chunked(text).await
        } else {
            self.extract_single(text).await
        }
    }

    async fn extract_single(&self, text: &str) -> Result<ExtractionResult> {
        let reply = self
            .backend
            .complete(&prompts::variable_extraction(text), DEFAULT_MAX_TOKENS)
            .await?;
        let raw: RawExtraction = lexi_llm::parse_model_json(&reply).into_result()?;
        let variables = raw.variables();
        let tags = raw.tags();
        Ok(ExtractionResult {
            title: non_blank(raw.title),
            doc_type: non_blank(raw.doc_type),
            file_description: non_blank(raw.file_description),
            similarity_tags: tags,
            variables,
        })
    }

    async fn extract_chunked(&self, text: &str) -> Result<ExtractionResult> {
        let chunks = self.chunker.split(text);
        info!(
            "Extracting variables from {} chunks ({} chars)",
            chunks.len(),
            text.chars().count()
        );

        let mut result = ExtractionResult::default();
        for chunk in &chunks {
            let prompt = if chunk.chunk_index == 0 {
                prompts::variable_extraction(&chunk.text)
            } else {
                let known = serde_json::to_string_pretty(&result.variables)?;
                prompts::extraction_continuation(&known, chunk.chunk_index + 1, &chunk.text)
            };

            let reply = self.backend.complete(&prompt, DEFAULT_MAX_TOKENS).await?;
            match lexi_llm::parse_model_json::<RawExtraction>(&reply) {
                ModelOutput::Parsed(raw) => {
                    let found = raw.variables();
                    debug!(
                        "Chunk {}/{} returned {} variables",
                        chunk.chunk_index + 1,
                        chunks.len(),
                        found.len()
                    );
                    if chunk.chunk_index == 0 {
                        result.similarity_tags = raw.tags();
                        result.title = non_blank(raw.title);
                        result.doc_type = non_blank(raw.doc_type);
                        result.file_description = non_blank(raw.file_description);
                    }
                    merge_variables(&mut result.variables, found);
                }
                ModelOutput::Malformed { error } => {
                    warn!(
                        "Skipping chunk {}/{}: unreadable model reply ({})",
                        chunk.chunk_index + 1,
                        chunks.len(),
                        error
                    );
                }
            }
        }
        Ok(result)
    }
}

/// Asks the model to rewrite a document as a Markdown template body.
pub struct TemplateBodyGenerator<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> TemplateBodyGenerator<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Markdown body with `{{key}}` placeholders for `variables`.
    pub async fn generate(&self, text: &str, variables: &[Variable]) -> Result<String> {
        let variables_json = serde_json::to_string_pretty(variables)?;
        let reply = self
            .backend
            .complete(&prompts::template_body(text, &variables_json), BODY_MAX_TOKENS)
            .await?;
        Ok(strip_markdown_fence(&reply).to_string())
    }
}

fn strip_markdown_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    for opener in ["```markdown", "```md"] {
        if let Some(rest) = trimmed.strip_prefix(opener) {
            return rest.strip_suffix("```").unwrap_or(rest).trim();
        }
    }
    lexi_llm::strip_code_fences(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexi_core::Error;
    use lexi_llm::mock::ScriptedBackend;

    fn extraction_reply(title: &str, keys: &[&str]) -> String {
        let vars: Vec<Value> = keys
            .iter()
            .map(|k| {
                serde_json::json!({
                    "key": k,
                    "label": k.replace('_', " "),
                    "description": format!("The {}", k),
                    "example": "x",
                    "required": true,
                    "dtype": "string"
                })
            })
            .collect();
        serde_json::json!({
            "title": title,
            "doc_type": "legal_notice",
            "file_description": "A notice",
            "similarity_tags": ["insurance", "notice"],
            "variables": vars
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_single_document_extraction() {
        let backend = ScriptedBackend::new().with_reply(format!(
            "```json\n{}\n```",
            extraction_reply("Incident Notice", &["policy_number", "insured_name"])
        ));
        let result = VariableExtractor::new(&backend)
            .extract("Policy Number: POL-2024-12345678")
            .await
            .unwrap();

        assert_eq!(result.title.as_deref(), Some("Incident Notice"));
        assert_eq!(result.doc_type.as_deref(), Some("legal_notice"));
        assert_eq!(result.similarity_tags, vec!["insurance", "notice"]);
        let keys: Vec<&str> = result.variables.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["policy_number", "insured_name"]);
        assert!(backend.prompts()[0].contains("POL-2024-12345678"));
    }

    #[tokio::test]
    async fn test_single_document_parse_failure_is_fatal() {
        let backend = ScriptedBackend::new().with_reply("Sorry, I can't do that.");
        let err = VariableExtractor::new(&backend)
            .extract("short text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let backend = ScriptedBackend::new().with_upstream_error("429 exhausted");
        let err = VariableExtractor::new(&backend)
            .extract("short text")
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_chunked_merge_keeps_first_occurrence() {
        let text = format!("{}\n\n{}\n\n{}", "a".repeat(60), "b".repeat(60), "c".repeat(60));
        let backend = ScriptedBackend::new()
            .with_reply(extraction_reply("First", &["a", "b"]))
            .with_reply(
                serde_json::json!({
                    "title": "Ignored",
                    "variables": [
                        {"key": "b", "label": "B again", "dtype": "date"},
                        {"key": "c", "label": "C"}
                    ]
                })
                .to_string(),
            )
            .with_default_reply(r#"{"variables": []}"#);

        let result = VariableExtractor::new(&backend)
            .with_chunking(100, TextChunker::new(80, 10))
            .extract(&text)
            .await
            .unwrap();

        let keys: Vec<&str> = result.variables.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(result.variables[1].label, "b");
        assert_eq!(result.title.as_deref(), Some("First"));

        let prompts = backend.prompts();
        assert!(prompts.len() >= 2);
        assert!(prompts[1].contains("Document Chunk 2"));
        assert!(prompts[1].contains("\"key\": \"a\""));
    }

    #[tokio::test]
    async fn test_chunked_skips_unreadable_chunk() {
        let text = format!("{}\n\n{}", "a".repeat(70), "b".repeat(70));
        let backend = ScriptedBackend::new()
            .with_reply("not json at all")
            .with_default_reply(r#"{"variables": [{"key": "late", "label": "Late",}],}"#);

        let result = VariableExtractor::new(&backend)
            .with_chunking(100, TextChunker::new(80, 10))
            .extract(&text)
            .await
            .unwrap();

        assert!(result.title.is_none());
        assert_eq!(result.variables.len(), 1);
        assert_eq!(result.variables[0].key, "late");
    }

    #[test]
    fn test_merge_variables() {
        let var = |k: &str, label: &str| Variable {
            key: k.into(),
            label: label.into(),
            description: None,
            example: None,
            required: true,
            dtype: Default::default(),
            regex: None,
            enum_values: None,
        };
        let mut merged = vec![var("a", "A"), var("b", "B1")];
        merge_variables(&mut merged, vec![var("b", "B2"), var("c", "C")]);
        let labels: Vec<&str> = merged.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B1", "C"]);
    }

    #[tokio::test]
    async fn test_body_generation_strips_fence() {
        let backend =
            ScriptedBackend::new().with_reply("```markdown\n# Notice\nPolicy {{policy_number}}\n```");
        let body = TemplateBodyGenerator::new(&backend)
            .generate("Policy POL-1", &[])
            .await
            .unwrap();
        assert_eq!(body, "# Notice\nPolicy {{policy_number}}");
    }
}
