//! AI endpoints: cost prediction, image analysis, cost report.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    routing::post,
};
use serde::Deserialize;

use super::AppState;
use crate::core::models::{CostLine, ProjectEstimate};
use crate::core::prediction::{CostPrediction, ProjectBrief, predict_cost};
use crate::core::report::{CostReport, generate_report};
use crate::core::vision::{ImageAnalysis, MAX_IMAGE_BYTES, analyze_image};
use crate::error::{BimcostError, Result};

/// Body of the report endpoint: lines as returned by the element endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub project_name: String,
    #[serde(default)]
    pub urn: String,
    pub lines: Vec<CostLine>,
}

/// POST /api/ai/predict-cost
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<ProjectBrief>, JsonRejection>,
) -> Result<Json<CostPrediction>> {
    let Json(brief) = body.map_err(|e| BimcostError::InvalidInput(e.body_text()))?;
    let prediction = predict_cost(&state.gateway, &brief).await?;
    Ok(Json(prediction))
}

/// POST /api/ai/analyze-image
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImageAnalysis>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| BimcostError::InvalidInput(e.body_text()))?
        .ok_or_else(|| BimcostError::InvalidInput("no image in request".to_string()))?;
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| BimcostError::InvalidInput(e.body_text()))?;

    let analysis = analyze_image(&state.gateway, bytes.to_vec(), &mime_type).await?;
    Ok(Json(analysis))
}

/// POST /api/ai/report
pub async fn report(
    State(state): State<AppState>,
    body: std::result::Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<CostReport>> {
    let Json(request) = body.map_err(|e| BimcostError::InvalidInput(e.body_text()))?;
    if request.project_name.trim().is_empty() {
        return Err(BimcostError::InvalidInput(
            "projectName must not be empty".to_string(),
        ));
    }
    let estimate = ProjectEstimate::from_lines(request.urn, request.lines);
    let report = generate_report(&state.gateway, request.project_name.trim(), &estimate).await?;
    Ok(Json(report))
}

/// Build AI routes.
pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/analyze-image", post(analyze))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
        .route("/api/ai/predict-cost", post(predict))
        .route("/api/ai/report", post(report))
}
