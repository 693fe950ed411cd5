//! Document upload: text extraction followed by variable extraction.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use lexi_core::{Error, LexiConfig};
use lexi_ingest::file::PREVIEW_CHARS;
use lexi_ingest::{extract_text, text_preview};
use lexi_templating::{TemplateBodyGenerator, VariableExtractor};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_DOC_TYPE: &str = "other";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload_document))
}

#[derive(Debug, Default, Deserialize)]
struct UploadParams {
    /// Also ask the model for a Markdown body with placeholders.
    #[serde(default)]
    generate_body: bool,
}

/// POST /api/upload — multipart `file` field (.docx or .pdf).
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;
    validate_upload(&state.config, &filename, bytes.len())?;

    // pdf-extract can panic on malformed input; keep it off the async workers.
    let name = filename.clone();
    let extracted = tokio::task::spawn_blocking(move || extract_text(&bytes, &name))
        .await
        .map_err(|e| Error::Extraction(format!("Text extraction aborted: {}", e)))??;

    if extracted.text.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Could not extract any text from the document",
        ));
    }

    let document_id =
        state
            .store
            .add_document(&filename, Some(extracted.mime), &extracted.text, None)?;
    info!(
        "Stored upload {} as document {} ({} chars)",
        filename,
        document_id,
        extracted.text.chars().count()
    );

    let backend = state.llm.as_ref();
    let extraction = VariableExtractor::new(backend).extract(&extracted.text).await?;

    let suggested_body_md = if params.generate_body {
        Some(
            TemplateBodyGenerator::new(backend)
                .generate(&extracted.text, &extraction.variables)
                .await?,
        )
    } else {
        None
    };

    let suggested_title = extraction
        .title
        .unwrap_or_else(|| filename_stem(&filename).to_string());
    let suggested_doc_type = extraction
        .doc_type
        .unwrap_or_else(|| DEFAULT_DOC_TYPE.to_string());

    let mut response = json!({
        "document_id": document_id,
        "filename": filename,
        "extracted_text_preview": text_preview(&extracted.text, PREVIEW_CHARS),
        "text_length": extracted.text.chars().count(),
        "variables": extraction.variables,
        "suggested_title": suggested_title,
        "suggested_doc_type": suggested_doc_type,
        "suggested_file_description": extraction.file_description,
        "similarity_tags": extraction.similarity_tags,
    });
    if let Some(body) = suggested_body_md {
        response["suggested_body_md"] = Value::String(body);
    }
    Ok(Json(response))
}

/// First multipart field carrying a filename.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e.body_text())))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e.body_text())))?;
        return Ok((filename, bytes));
    }
    Err(ApiError::bad_request("No file provided"))
}

/// Lowercase `.ext` of `filename`, empty when there is none.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn filename_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

fn validate_upload(config: &LexiConfig, filename: &str, size: usize) -> ApiResult<()> {
    let extension = extension_of(filename);
    if !config.allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(ApiError::bad_request(format!(
            "Invalid file type. Allowed: {}",
            config.allowed_extensions.join(", ")
        )));
    }
    if size > config.max_upload_bytes() {
        return Err(ApiError::bad_request(format!(
            "File too large. Max size: {}MB",
            config.max_file_size_mb
        )));
    }
    Ok(())
}
