//! Human-friendly questions for unanswered variables.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use lexi_core::Result;
use lexi_llm::{parse_model_json, prompts, CompletionBackend, ModelOutput, DEFAULT_MAX_TOKENS};
use lexi_store::types::lenient_string;
use lexi_store::{Template, Variable};

/// A question asking the user for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableQuestion {
    pub key: String,
    pub question: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hint: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub example: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl VariableQuestion {
    /// Plain question used when the model reply cannot be read.
    pub fn fallback(var: &Variable) -> Self {
        Self {
            key: var.key.clone(),
            question: format!("Please provide the {}:", var.display_label()),
            hint: var.description.clone(),
            example: var.example.clone(),
            required: var.required,
        }
    }
}

/// Variables of `template` whose key is in `missing_keys`, in template order.
pub fn select_missing<'t>(template: &'t Template, missing_keys: &[String]) -> Vec<&'t Variable> {
    template
        .variables
        .iter()
        .filter(|v| missing_keys.iter().any(|k| k == &v.key))
        .collect()
}

/// Ask the model to phrase one question per variable.
///
/// No variables means no call. Variables the reply leaves without a readable
/// question get a `Please provide the {label}:` question.
pub async fn generate_questions(
    backend: &dyn CompletionBackend,
    variables: &[&Variable],
) -> Result<Vec<VariableQuestion>> {
    if variables.is_empty() {
        return Ok(Vec::new());
    }

    let definitions: Vec<Value> = variables
        .iter()
        .map(|v| {
            json!({
                "key": v.key,
                "label": v.label,
                "description": v.description,
                "example": v.example,
                "required": v.required,
                "dtype": v.dtype,
            })
        })
        .collect();
    let definitions_json = serde_json::to_string_pretty(&definitions)?;

    let reply = backend
        .complete(&prompts::question_generation(&definitions_json), DEFAULT_MAX_TOKENS)
        .await?;

    let mut phrased: Vec<VariableQuestion> = match parse_model_json::<Vec<Value>>(&reply) {
        ModelOutput::Parsed(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<VariableQuestion>(item) {
                Ok(q) => Some(q),
                Err(e) => {
                    warn!("Dropping unreadable question: {}", e);
                    None
                }
            })
            .collect(),
        ModelOutput::Malformed { error } => {
            warn!("Unreadable question reply, using fallback questions: {}", error);
            Vec::new()
        }
    };

    // One question per requested variable; gaps get the plain fallback.
    Ok(variables
        .iter()
        .map(|v| match phrased.iter().position(|q| q.key == v.key) {
            Some(idx) => phrased.swap_remove(idx),
            None => VariableQuestion::fallback(v),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexi_llm::mock::ScriptedBackend;

    fn var(key: &str, label: &str) -> Variable {
        Variable {
            key: key.into(),
            label: label.into(),
            description: Some(format!("The {}", label.to_lowercase())),
            example: Some("EX".into()),
            required: key != "optional_note",
            dtype: Default::default(),
            regex: None,
            enum_values: None,
        }
    }

    #[tokio::test]
    async fn test_model_questions() {
        let backend = ScriptedBackend::new().with_reply(
            r#"[{"key": "policy_number", "question": "What is your policy number?", "hint": "First page", "example": "POL-1"}]"#,
        );
        let v = var("policy_number", "Policy Number");
        let questions = generate_questions(&backend, &[&v]).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "What is your policy number?");
        assert!(questions[0].required);
    }

    #[tokio::test]
    async fn test_fallback_questions() {
        let backend = ScriptedBackend::new().with_reply("Here are some questions: ...");
        let a = var("policy_number", "Policy Number");
        let b = var("optional_note", "");
        let questions = generate_questions(&backend, &[&a, &b]).await.unwrap();
        assert_eq!(questions[0].question, "Please provide the Policy Number:");
        assert_eq!(questions[0].hint.as_deref(), Some("The policy number"));
        assert_eq!(questions[0].example.as_deref(), Some("EX"));
        assert_eq!(questions[1].question, "Please provide the optional_note:");
        assert!(!questions[1].required);
    }

    #[tokio::test]
    async fn test_gaps_in_reply_get_fallback_questions() {
        let a = var("policy_number", "Policy Number");
        let b = var("insured_name", "Insured Name");

        let empty = ScriptedBackend::new().with_reply("[]");
        let questions = generate_questions(&empty, &[&a, &b]).await.unwrap();
        let texts: Vec<&str> = questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Please provide the Policy Number:", "Please provide the Insured Name:"]
        );

        let partial = ScriptedBackend::new().with_reply(
            r#"[{"key": "insured_name", "question": "Who is insured?"}, {"question": "no key"}]"#,
        );
        let questions = generate_questions(&partial, &[&a, &b]).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].key, "policy_number");
        assert_eq!(questions[0].question, "Please provide the Policy Number:");
        assert_eq!(questions[1].question, "Who is insured?");
    }

    #[tokio::test]
    async fn test_no_variables_no_call() {
        let backend = ScriptedBackend::new();
        assert!(generate_questions(&backend, &[]).await.unwrap().is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_select_missing_keeps_template_order() {
        let template = Template {
            id: 1,
            template_id: "tpl_x".into(),
            title: "X".into(),
            doc_type: None,
            jurisdiction: None,
            file_description: None,
            similarity_tags: vec![],
            body_md: String::new(),
            embedding: None,
            variables: vec![var("a", "A"), var("b", "B"), var("c", "C")],
            created_at: chrono::Utc::now(),
        };
        let picked = select_missing(&template, &["c".into(), "a".into(), "zzz".into()]);
        let keys: Vec<&str> = picked.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
