//! Chat flow: match a request to a template, ask for missing values, render a draft.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use lexi_store::Answers;
use lexi_templating::{generate_questions, render, select_missing, MatchOutcome, Matcher};

use super::templates::load_template;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/match", post(match_template))
        .route("/chat/questions", post(questions))
        .route("/chat/generate", post(generate_draft))
        .route("/chat/vars/{template_id}", get(template_variables))
}

#[derive(Debug, Deserialize)]
struct MatchRequest {
    query: String,
}

/// POST /api/chat/match
async fn match_template(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<MatchRequest>,
) -> ApiResult<Json<MatchOutcome>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query must not be empty"));
    }
    let templates = state.store.all_templates()?;
    let outcome = Matcher::new(state.llm.as_ref())
        .match_query(&req.query, &templates)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct QuestionsRequest {
    template_id: String,
    #[serde(default)]
    missing_keys: Vec<String>,
}

/// POST /api/chat/questions
async fn questions(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<QuestionsRequest>,
) -> ApiResult<Json<Value>> {
    let template = load_template(&state, &req.template_id)?;
    let missing = select_missing(&template, &req.missing_keys);
    let questions = generate_questions(state.llm.as_ref(), &missing).await?;
    Ok(Json(json!({ "questions": questions })))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    template_id: String,
    #[serde(default)]
    answers: Answers,
    #[serde(default)]
    user_query: Option<String>,
}

/// POST /api/chat/generate — render and store a draft.
async fn generate_draft(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> ApiResult<Json<Value>> {
    let template = load_template(&state, &req.template_id)?;
    let draft_md = render(&template.body_md, &req.answers);
    let instance = state.store.create_instance(
        template.id,
        req.user_query.as_deref(),
        &req.answers,
        &draft_md,
    )?;
    info!("Generated draft {} from {}", instance.id, template.template_id);

    Ok(Json(json!({
        "draft_id": instance.id,
        "draft_md": instance.draft_md,
        "template_title": template.title,
        "created_at": instance.created_at,
    })))
}

/// GET /api/chat/vars/{template_id}
async fn template_variables(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let template = load_template(&state, &template_id)?;
    let variables: Vec<Value> = template
        .variables
        .iter()
        .map(|v| {
            json!({
                "key": v.key,
                "label": v.label,
                "required": v.required,
                "dtype": v.dtype,
                "example": v.example,
            })
        })
        .collect();
    Ok(Json(json!({
        "template_id": template.template_id,
        "template_title": template.title,
        "variables": variables,
    })))
}
