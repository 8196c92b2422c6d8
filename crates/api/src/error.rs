//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use read_model::ReadModelError;
use thiserror::Error;

use crate::response::ErrorBody;

const INTERNAL_MESSAGE: &str = "Something went wrong";

/// API-level error type that maps to the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    ReadModel(#[from] ReadModelError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Domain(err) => domain_status(err),
            ApiError::ReadModel(err) => read_model_status(err),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn domain_status(err: &DomainError) -> (StatusCode, String) {
    let status = match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        // Collaborator failures carry a user-facing message.
        DomainError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DomainError::Store(_) | DomainError::Serialization(_) => return internal(),
    };
    (status, err.to_string())
}

fn read_model_status(err: &ReadModelError) -> (StatusCode, String) {
    match err {
        ReadModelError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ReadModelError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ReadModelError::Store(_) => internal(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
        }
        (status, Json(ErrorBody::new(status, message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
