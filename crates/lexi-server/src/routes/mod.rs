//! HTTP route handlers, nested under `/api`.

pub mod chat;
pub mod drafts;
pub mod health;
pub mod templates;
pub mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Slack above the upload cap so an oversized file still reaches the size check.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes() + BODY_LIMIT_SLACK;
    Router::new()
        .merge(health::root_routes())
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(upload::routes())
        .merge(templates::routes())
        .merge(chat::routes())
        .merge(drafts::routes())
}

/// `?skip=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Paging {
    /// Requested limit, `default` when absent, clamped to `1..=max`.
    pub fn limit_or(&self, default: usize, max: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}
