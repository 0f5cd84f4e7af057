//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hourglass_types::error::SessionError;

use super::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    /// Malformed path or body, rejected before reaching the engine.
    BadRequest(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Session(e) => match e {
                SessionError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                SessionError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                SessionError::PreconditionFailed(_) => {
                    (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED")
                }
                SessionError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                SessionError::SessionClosed(_) => (StatusCode::CONFLICT, "SESSION_CLOSED"),
                SessionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Session(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }
        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
