//! Liveness endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn root_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(root))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app": "Lexi - Document Templatization System",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "llm": state.llm.name(),
    }))
}
