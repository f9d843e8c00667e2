//! Service status and health endpoints.

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use serde::Serialize;

use super::AppState;
use crate::core::models::ServiceStatus;
use crate::core::provider::AiProvider;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Credential presence per service. Makes no remote call.
#[must_use]
pub fn service_status(state: &AppState) -> ServiceStatus {
    let table = state.gateway.table();
    ServiceStatus {
        xai: table.is_available(AiProvider::Xai),
        openai: table.is_available(AiProvider::OpenAi),
        forge: state.forge.is_configured(),
    }
}

/// GET /api/service-status
pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(service_status(&state))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    Json(HealthResponse {
        status: "ok",
        service: "bimcost",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: u64::try_from(uptime.num_seconds()).unwrap_or(0),
    })
}

/// Build status routes.
pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/api/service-status", get(status))
        .route("/health", get(health))
}
