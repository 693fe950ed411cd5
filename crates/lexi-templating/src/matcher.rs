//! Matching a free-text request to stored templates and prefilling answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use lexi_core::Result;
use lexi_llm::{parse_model_json, prompts, CompletionBackend, ModelOutput, DEFAULT_MAX_TOKENS};
use lexi_store::Template;

use crate::render::value_to_string;

pub const NO_TEMPLATES_REASON: &str = "No templates available in database";
pub const UNPARSEABLE_MATCH_REASON: &str = "Failed to parse matching response";
pub const NO_MATCH_REASON: &str = "No matching templates found";
pub const UNKNOWN_IDS_REASON: &str = "Matched templates not found in database";

const MAX_ALTERNATIVES: usize = 2;

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template_id: String,
    pub title: String,
    pub score: f64,
    pub reason: String,
    pub doc_type: Option<String>,
    pub similarity_tags: Vec<String>,
}

/// Ranking outcome: candidates in model order, or why there are none.
#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    Matches(Vec<TemplateMatch>),
    NoMatch { reason: String },
}

/// Full match response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    pub best_match: Option<TemplateMatch>,
    pub alternatives: Vec<TemplateMatch>,
    pub prefilled_variables: BTreeMap<String, String>,
    pub missing_variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_match_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRanking {
    #[serde(default)]
    matches: Option<Vec<RawMatch>>,
    #[serde(default)]
    no_match_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    template_id: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrefill {
    #[serde(default)]
    prefilled: Option<BTreeMap<String, Value>>,
}

/// Keys of `template`'s variables that are not in `prefilled`, in template order.
pub fn missing_variables(template: &Template, prefilled: &BTreeMap<String, String>) -> Vec<String> {
    template
        .variables
        .iter()
        .filter(|v| !prefilled.contains_key(&v.key))
        .map(|v| v.key.clone())
        .collect()
}

/// Template matcher over a completion backend.
pub struct Matcher<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> Matcher<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Rank `templates`, then prefill the best match's variables from `query`.
    pub async fn match_query(&self, query: &str, templates: &[Template]) -> Result<MatchOutcome> {
        let ranked = match self.rank(query, templates).await? {
            Ranking::Matches(ranked) => ranked,
            Ranking::NoMatch { reason } => {
                info!("No template match: {}", reason);
                return Ok(MatchOutcome {
                    no_match_reason: Some(reason),
                    ..Default::default()
                });
            }
        };

        let mut ranked = ranked.into_iter();
        let Some(best) = ranked.next() else {
            return Ok(MatchOutcome {
                no_match_reason: Some(NO_MATCH_REASON.into()),
                ..Default::default()
            });
        };
        let alternatives: Vec<TemplateMatch> = ranked.take(MAX_ALTERNATIVES).collect();

        let Some(template) = templates.iter().find(|t| t.template_id == best.template_id) else {
            return Ok(MatchOutcome {
                alternatives,
                no_match_reason: Some(UNKNOWN_IDS_REASON.into()),
                ..Default::default()
            });
        };

        let prefilled = self.prefill(query, template).await?;
        let missing = missing_variables(template, &prefilled);
        info!(
            "Matched {} (score {:.2}), {} prefilled, {} missing",
            best.template_id,
            best.score,
            prefilled.len(),
            missing.len()
        );

        Ok(MatchOutcome {
            best_match: Some(best),
            alternatives,
            prefilled_variables: prefilled,
            missing_variables: missing,
            no_match_reason: None,
        })
    }

    /// Ask the model to rank `templates` for `query`.
    ///
    /// An unreadable reply is a `NoMatch`. Returned ids that are not in
    /// `templates` are dropped.
    pub async fn rank(&self, query: &str, templates: &[Template]) -> Result<Ranking> {
        if templates.is_empty() {
            return Ok(Ranking::NoMatch {
                reason: NO_TEMPLATES_REASON.into(),
            });
        }

        let catalog: Vec<Value> = templates
            .iter()
            .map(|t| {
                json!({
                    "template_id": t.template_id,
                    "title": t.title,
                    "doc_type": t.doc_type,
                    "file_description": t.file_description,
                    "similarity_tags": t.similarity_tags,
                })
            })
            .collect();
        let catalog_json = serde_json::to_string_pretty(&catalog)?;

        let reply = self
            .backend
            .complete(&prompts::template_matching(query, &catalog_json), DEFAULT_MAX_TOKENS)
            .await?;

        let raw: RawRanking = match parse_model_json(&reply) {
            ModelOutput::Parsed(raw) => raw,
            ModelOutput::Malformed { error } => {
                warn!("Unreadable matching reply: {}", error);
                return Ok(Ranking::NoMatch {
                    reason: UNPARSEABLE_MATCH_REASON.into(),
                });
            }
        };

        let candidates = raw.matches.unwrap_or_default();
        if candidates.is_empty() {
            return Ok(Ranking::NoMatch {
                reason: raw
                    .no_match_reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| NO_MATCH_REASON.into()),
            });
        }

        let matches: Vec<TemplateMatch> = candidates
            .into_iter()
            .filter_map(|m| {
                let template = templates.iter().find(|t| t.template_id == m.template_id);
                if template.is_none() {
                    debug!("Model returned unknown template id {}", m.template_id);
                }
                template.map(|t| TemplateMatch {
                    template_id: t.template_id.clone(),
                    title: t.title.clone(),
                    score: m.score.unwrap_or(0.0),
                    reason: m.reason.unwrap_or_default(),
                    doc_type: t.doc_type.clone(),
                    similarity_tags: t.similarity_tags.clone(),
                })
            })
            .collect();

        if matches.is_empty() {
            return Ok(Ranking::NoMatch {
                reason: UNKNOWN_IDS_REASON.into(),
            });
        }
        Ok(Ranking::Matches(matches))
    }

    /// Values for `template`'s variables stated or strongly implied by `query`.
    ///
    /// Unreadable replies give an empty map. `null` values and keys the
    /// template does not declare are dropped.
    pub async fn prefill(&self, query: &str, template: &Template) -> Result<BTreeMap<String, String>> {
        if template.variables.is_empty() {
            return Ok(BTreeMap::new());
        }

        let variables: Vec<Value> = template
            .variables
            .iter()
            .map(|v| {
                json!({
                    "key": v.key,
                    "label": v.label,
                    "description": v.description,
                    "dtype": v.dtype,
                })
            })
            .collect();
        let variables_json = serde_json::to_string_pretty(&variables)?;

        let reply = self
            .backend
            .complete(&prompts::prefill_variables(query, &variables_json), DEFAULT_MAX_TOKENS)
            .await?;

        let raw: RawPrefill = match parse_model_json(&reply) {
            ModelOutput::Parsed(raw) => raw,
            ModelOutput::Malformed { error } => {
                warn!("Unreadable prefill reply: {}", error);
                return Ok(BTreeMap::new());
            }
        };

        Ok(raw
            .prefilled
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, value)| {
                !value.is_null() && template.variables.iter().any(|v| &v.key == key)
            })
            .map(|(key, value)| (key, value_to_string(&value)))
            .collect())
    }
}
