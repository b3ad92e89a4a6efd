//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub classifier: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub backend: String,
    pub status: String,
    pub latency_ms: u64,
}

/// Readiness check endpoint (readiness probe).
/// Asks the active classifier whether it can serve requests.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let classifier = state.service.classifier();
    let start = Instant::now();
    let ok = classifier.health_check().await;

    let response = ReadinessResponse {
        status: if ok { "ready" } else { "degraded" }.to_string(),
        classifier: CheckStatus {
            backend: classifier.name().to_string(),
            status: if ok { "ok" } else { "error" }.to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
    };

    if ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
