//! Upload, translation status, element and token endpoints.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::Field},
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use super::AppState;
use crate::core::models::{CostLine, ProjectEstimate, TranslationJob};
use crate::error::{BimcostError, Result};
use crate::forge::UploadPolicy;

/// Header carrying the caller identity used to scope object keys.
pub const USER_HEADER: &str = "x-user-id";

/// Scope used when no caller identity is supplied.
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Response header with the estimate total.
pub const PROJECT_TOTAL_HEADER: &str = "x-project-total";

/// Multipart framing allowance on top of the file ceiling.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: &'static str,
    pub urn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub progress: u8,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstantQuery {
    /// Declared stream length, when the caller knows it.
    pub size: Option<u64>,
}

/// POST /api/forge/upload
///
/// Validating path: spool to a temp file under the size ceiling, upload,
/// then submit the translation job.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let policy = state.upload_policy;
    let mut field = next_file_field(&mut multipart).await?;
    let file_name = field_file_name(&field)?;
    policy.check_extension(&file_name)?;

    let spool = tempfile::NamedTempFile::new()
        .map_err(|e| BimcostError::Other(anyhow::anyhow!("create upload spool: {e}")))?;
    let size = spool_field(&mut field, reopen_spool(&spool)?, &policy).await?;
    policy.check(&file_name, size)?;

    let scope = caller_scope(&headers);
    let source = tokio::fs::File::from_std(reopen_spool(&spool)?);
    let session = state
        .forge
        .upload(source, &file_name, size, &scope, &policy, |p| {
            tracing::trace!(bytes = p.bytes_transferred, "Upload progress");
        })
        .await?;
    let urn = session
        .object_urn()
        .map(str::to_string)
        .ok_or_else(|| BimcostError::ParseResponse("upload finished without a URN".to_string()))?;

    let job = state.tracker.submit(&urn).await?;
    state.register_job(job).await;

    Ok(Json(UploadResponse {
        status: "translating",
        urn,
        bytes_received: None,
    }))
}

/// POST /api/forge/upload-instant
///
/// Raw path: drain the stream and hand back the deterministic URN.
pub async fn upload_instant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<InstantQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let field = next_file_field(&mut multipart).await?;
    let file_name = field_file_name(&field)?;
    let scope = caller_scope(&headers);

    let reader = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
    let session = state
        .forge
        .upload_instant(reader, &file_name, query.size, &scope, |_| {})
        .await?;

    Ok(Json(UploadResponse {
        status: "ready",
        urn: session.object_urn().unwrap_or_default().to_string(),
        bytes_received: Some(session.bytes_transferred()),
    }))
}

/// GET /api/forge/status/{urn}
///
/// Polls once per request. Unknown URNs start a tracking record, as do
/// URNs whose previous record timed out.
pub async fn status(
    State(state): State<AppState>,
    Path(urn): Path<String>,
) -> Result<Json<StatusResponse>> {
    let job = current_job(&state, &urn).await?;
    let job = state.tracker.poll(job).await?;
    let job = state.record_job(job).await;

    Ok(Json(StatusResponse {
        status: job.status.wire_label(),
        progress: job.progress_percent,
    }))
}

/// GET /api/forge/elements/{urn}
pub async fn elements(
    State(state): State<AppState>,
    Path(urn): Path<String>,
) -> Result<impl IntoResponse> {
    let mut job = current_job(&state, &urn).await?;
    if !job.status.is_terminal() {
        job = state.tracker.poll(job).await?;
        job = state.record_job(job).await;
    }

    let batch = state.forge.extract_elements(&job).await?;
    let records: Vec<_> = batch.records(&state.rates).collect();
    let estimate = ProjectEstimate::from_records(batch.urn(), &records);

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", estimate.total)) {
        headers.insert(PROJECT_TOTAL_HEADER, value);
    }
    Ok((headers, Json::<Vec<CostLine>>(estimate.lines)))
}

/// GET /api/forge/token
///
/// Read-only viewer token.
pub async fn token(State(state): State<AppState>) -> Result<Json<TokenResponse>> {
    let token = state.forge.viewer_tokens().access_token().await?;
    Ok(Json(TokenResponse {
        expires_in: token.expires_in(Utc::now()),
        access_token: token.token,
    }))
}

/// Build Forge routes. Upload bodies are bounded by the policy ceiling.
pub fn forge_routes(policy: UploadPolicy) -> Router<AppState> {
    let limit = usize::try_from(policy.max_bytes().saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);
    Router::new()
        .route("/api/forge/upload", post(upload))
        .route("/api/forge/upload-instant", post(upload_instant))
        .layer(DefaultBodyLimit::max(limit))
        .route("/api/forge/status/{urn}", get(status))
        .route("/api/forge/elements/{urn}", get(elements))
        .route("/api/forge/token", get(token))
}

async fn current_job(state: &AppState, urn: &str) -> Result<TranslationJob> {
    match state.job(urn).await {
        Some(job) => Ok(job),
        None => state.tracker.track(urn),
    }
}

fn caller_scope(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_SCOPE)
        .to_string()
}

async fn next_file_field(multipart: &mut Multipart) -> Result<Field<'_>> {
    multipart
        .next_field()
        .await
        .map_err(|e| BimcostError::InvalidInput(e.body_text()))?
        .ok_or_else(|| BimcostError::InvalidInput("no file in request".to_string()))
}

fn field_file_name(field: &Field<'_>) -> Result<String> {
    field
        .file_name()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BimcostError::InvalidInput("file name is missing".to_string()))
}

fn reopen_spool(spool: &tempfile::NamedTempFile) -> Result<std::fs::File> {
    spool
        .reopen()
        .map_err(|e| BimcostError::Other(anyhow::anyhow!("reopen upload spool: {e}")))
}

/// Copy a multipart field into `spool`, stopping as soon as the ceiling is
/// crossed. Returns the byte count.
async fn spool_field(
    field: &mut Field<'_>,
    spool: std::fs::File,
    policy: &UploadPolicy,
) -> Result<u64> {
    let mut out = tokio::fs::File::from_std(spool);
    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| BimcostError::InvalidInput(e.body_text()))?
    {
        size += chunk.len() as u64;
        policy.check_size(size)?;
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_scope(&headers), ANONYMOUS_SCOPE);
        headers.insert(USER_HEADER, HeaderValue::from_static("  "));
        assert_eq!(caller_scope(&headers), ANONYMOUS_SCOPE);
        headers.insert(USER_HEADER, HeaderValue::from_static("user-42"));
        assert_eq!(caller_scope(&headers), "user-42");
    }
}
