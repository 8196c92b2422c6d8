//! Liveness endpoint.

use axum::http::StatusCode;
use serde::Serialize;

use crate::response::ApiResponse;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// GET /health
pub async fn check() -> ApiResponse<HealthStatus> {
    ApiResponse::new(StatusCode::OK, HealthStatus { status: "ok" }, "Service is healthy")
}
