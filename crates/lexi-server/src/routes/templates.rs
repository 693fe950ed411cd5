//! Template catalog: create, list, read, delete, export and similarity search.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use lexi_store::{cosine_similarity, NewTemplate, Template, TemplateSummary};
use lexi_templating::export::exported_variables;
use lexi_templating::{template_markdown, variables_csv, ExportFormat};

use super::Paging;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 500;
const DEFAULT_TOP_K: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/search", post(search_templates))
        .route("/templates/{id}", get(get_template).delete(delete_template))
        .route("/templates/{id}/export", get(export_variables))
        .route("/templates/{id}/markdown", get(template_markdown_file))
}

pub(crate) fn load_template(state: &AppState, template_id: &str) -> ApiResult<Template> {
    state
        .store
        .get_template(template_id)?
        .ok_or_else(|| ApiError::not_found("Template not found"))
}

/// POST /api/templates
async fn create_template(
    State(state): State<Arc<AppState>>,
    ApiJson(new): ApiJson<NewTemplate>,
) -> ApiResult<Json<Template>> {
    let embedding = state.llm.embed(&new.embedding_text()).await;
    let template = state.store.create_template(&new, Some(&embedding))?;
    info!(
        "Created template {} with {} variables",
        template.template_id,
        template.variables.len()
    );
    Ok(Json(template))
}

/// GET /api/templates?skip=&limit=
async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(paging): Query<Paging>,
) -> ApiResult<Json<Vec<TemplateSummary>>> {
    let limit = paging.limit_or(DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
    let templates = state.store.list_templates(paging.skip, limit)?;
    Ok(Json(templates.iter().map(Template::summary).collect()))
}

/// GET /api/templates/{id}
async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Template>> {
    Ok(Json(load_template(&state, &id)?))
}

/// DELETE /api/templates/{id}
async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_template(&id)? {
        return Err(ApiError::not_found("Template not found"));
    }
    info!("Deleted template {}", id);
    Ok(Json(json!({
        "message": "Template deleted successfully",
        "template_id": id,
    })))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "json".into()
}

/// GET /api/templates/{id}/export?format=json|csv
async fn export_variables(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let format = ExportFormat::parse(&params.format)?;
    let template = load_template(&state, &id)?;
    let response = match format {
        ExportFormat::Json => Json(json!({
            "template_id": template.template_id,
            "variables": exported_variables(&template),
        }))
        .into_response(),
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}_variables.csv", template.template_id),
                ),
            ],
            variables_csv(&template),
        )
            .into_response(),
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct MarkdownParams {
    #[serde(default = "default_true")]
    include_frontmatter: bool,
}

fn default_true() -> bool {
    true
}

/// GET /api/templates/{id}/markdown?include_frontmatter=bool
async fn template_markdown_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<MarkdownParams>,
) -> ApiResult<Response> {
    let template = load_template(&state, &id)?;
    let markdown = template_markdown(&template, params.include_frontmatter)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}.md", template.template_id),
            ),
        ],
        markdown,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// POST /api/templates/search — cosine similarity over stored embeddings.
async fn search_templates(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SearchRequest>,
) -> ApiResult<Json<Value>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K).max(1);

    let query_embedding = state.llm.embed(&req.query).await;
    if query_embedding.is_empty() {
        debug!("No query embedding, returning no search results");
        return Ok(Json(json!({ "query": req.query, "results": [] })));
    }

    let mut scored: Vec<(f32, Template)> = state
        .store
        .all_templates()?
        .into_iter()
        .filter_map(|t| {
            let score = cosine_similarity(&query_embedding, t.embedding.as_deref()?);
            Some((score, t))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let results: Vec<Value> = scored
        .into_iter()
        .take(top_k)
        .map(|(score, t)| {
            json!({
                "template_id": t.template_id,
                "title": t.title,
                "doc_type": t.doc_type,
                "similarity_tags": t.similarity_tags,
                "score": score,
            })
        })
        .collect();
    Ok(Json(json!({ "query": req.query, "results": results })))
}
