use axum::Json;

use crate::api::types::HealthResponse;

/// `GET /health`: liveness probe.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
