//! Draft history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use lexi_store::Instance;

use super::Paging;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drafts", get(list_drafts))
        .route("/drafts/{id}", get(get_draft).delete(delete_draft))
        .route("/drafts/{id}/download", get(download_draft))
}

fn load_draft(state: &AppState, id: i64) -> ApiResult<Instance> {
    state
        .store
        .get_instance(id)?
        .ok_or_else(|| ApiError::not_found("Draft not found"))
}

/// GET /api/drafts?skip=&limit= — newest first.
async fn list_drafts(
    State(state): State<Arc<AppState>>,
    Query(paging): Query<Paging>,
) -> ApiResult<Json<Vec<Value>>> {
    let limit = paging.limit_or(DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
    let drafts = state
        .store
        .list_instances(paging.skip, limit)?
        .into_iter()
        .map(|d| {
            json!({
                "id": d.id,
                "template_id": d.template_id,
                "template_title": d.display_title(),
                "user_query": d.user_query,
                "preview": d.preview(),
                "created_at": d.created_at,
            })
        })
        .collect();
    Ok(Json(drafts))
}

/// GET /api/drafts/{id}
async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let draft = load_draft(&state, id)?;
    Ok(Json(json!({
        "id": draft.id,
        "template_id": draft.template_id,
        "template_title": draft.display_title(),
        "user_query": draft.user_query,
        "answers": draft.answers,
        "draft_md": draft.draft_md,
        "created_at": draft.created_at,
    })))
}

/// GET /api/drafts/{id}/download — the stored Markdown as an attachment.
async fn download_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let draft = load_draft(&state, id)?;
    let disposition = format!("attachment; filename={}", draft.download_filename());
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        draft.draft_md,
    )
        .into_response())
}

/// DELETE /api/drafts/{id}
async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_instance(id)? {
        return Err(ApiError::not_found("Draft not found"));
    }
    info!("Deleted draft {}", id);
    Ok(Json(json!({
        "message": "Draft deleted successfully",
        "draft_id": id,
    })))
}
