//! Mapping of library errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use lexi_core::Error;

/// Error returned by route handlers.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(Error::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(Error::NotFound(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::Extraction(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Extraction(_) => "EXTRACTION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Upstream(_) => "UPSTREAM_ERROR",
            Error::ModelOutput(_) => "MODEL_OUTPUT_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Client errors carry their own message; upstream errors keep the
    /// provider detail.
    fn message(&self) -> String {
        match &self.0 {
            Error::Validation(msg) | Error::NotFound(msg) | Error::Extraction(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.message(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError(Error::Upstream("429".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(Error::Extraction("bad pdf".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_upstream_message_keeps_detail() {
        let err = ApiError(Error::Upstream("Rate limit exceeded after 3 attempts".into()));
        assert!(err.message().contains("Rate limit exceeded after 3 attempts"));
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }
}
