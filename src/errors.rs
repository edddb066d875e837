use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid GitHub identifier: {0}")]
    InvalidIdentifier(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("GitHub unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("GitHub responded with status {status}")]
    UpstreamError { status: u16, body: String },

    #[error("malformed GitHub payload: {0}")]
    MalformedUpstreamPayload(String),

    #[error("persistence error: {0}")]
    Persistence(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentifier(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_)
            | AppError::UpstreamError { .. }
            | AppError::MalformedUpstreamPayload(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable code, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidIdentifier(_) => "invalid_identifier",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::UpstreamError { .. } => "upstream_error",
            AppError::MalformedUpstreamPayload(_) => "malformed_upstream_payload",
            AppError::Persistence(_) => "persistence_error",
            AppError::Internal(_) => "internal_server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (error_type, msg) = match &self {
            AppError::InvalidIdentifier(raw) => (
                "invalid_request_error",
                format!("expected a GitHub user, owner/repo or profile URL, got '{}'", raw),
            ),
            AppError::BadRequest(msg) => ("invalid_request_error", msg.clone()),
            AppError::Unauthorized => (
                "authentication_error",
                "invalid or missing admin key".to_string(),
            ),
            AppError::NotFound(what) => ("not_found_error", format!("{} not found", what)),
            AppError::UpstreamUnavailable(e) => ("upstream_error", e.clone()),
            AppError::UpstreamError { status, body } => (
                "upstream_error",
                format!("GitHub API status {}: {}", status, body),
            ),
            AppError::MalformedUpstreamPayload(e) => (
                "upstream_error",
                format!("could not decode GitHub response: {}", e),
            ),
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {:#}", e);
                ("internal_error", "internal server error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                ("internal_error", "internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
