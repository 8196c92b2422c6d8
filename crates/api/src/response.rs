//! The JSON envelope every endpoint answers with.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Successful response: `{statusCode, data, message, success: true}`.
///
/// The HTTP status mirrors `statusCode`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    status_code: u16,
    data: T,
    message: String,
    success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Failed response: `{statusCode, data: null, message, success: false, errors: []}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub data: Option<()>,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data: None,
            message: message.into(),
            success: false,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = ApiResponse::created(json!({"name": "x"}), "Created");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"statusCode": 201, "data": {"name": "x"}, "message": "Created", "success": true})
        );
    }

    #[test]
    fn error_envelope_shape() {
        let value = serde_json::to_value(ErrorBody::new(StatusCode::NOT_FOUND, "Video not found"))
            .unwrap();
        assert_eq!(
            value,
            json!({
                "statusCode": 404,
                "data": null,
                "message": "Video not found",
                "success": false,
                "errors": []
            })
        );
    }

    #[test]
    fn status_follows_envelope() {
        let response = ApiResponse::created((), "done").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
