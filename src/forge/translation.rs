//! Translation job tracker.
//!
//! An explicit state machine over [`TranslationJob`]: `submit` registers the
//! job, `poll` queries the remote manifest exactly once and advances the
//! record, and `wait` drives polls on a fixed interval until a terminal
//! state or cancellation. Abandoning a wait never touches the remote job.

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::client::ForgeClient;
use super::upload::decode_urn;
use crate::core::http::{DEFAULT_TIMEOUT, ensure_success, fetch_json, send_error};
use crate::core::models::{JobStatus, TranslationJob};
use crate::error::{BimcostError, Result};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})\s*%").unwrap());

// =============================================================================
// Remote Status
// =============================================================================

/// Status as reported by the remote manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    /// The remote service gave up on the job.
    Timeout,
}

impl RemoteStatus {
    /// Parse a manifest status string. Unknown values count as pending.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "inprogress" | "in_progress" => Self::InProgress,
            "success" | "complete" => Self::Success,
            "failed" => Self::Failed,
            "timeout" => Self::Timeout,
            _ => Self::Pending,
        }
    }
}

/// One manifest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteManifest {
    pub status: RemoteStatus,
    pub progress: Option<u8>,
}

/// Parse a manifest progress string ("45% complete", "complete").
#[must_use]
pub fn parse_progress(raw: &str) -> Option<u8> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("complete") {
        return Some(100);
    }
    PROGRESS_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(|p| p.min(100))
}

/// Validate the shape of a URN before sending it anywhere.
///
/// # Errors
///
/// Returns `Submission` if the value is not a base64-encoded object URN.
pub fn validate_urn(urn: &str) -> Result<()> {
    if decode_urn(urn).is_some() {
        Ok(())
    } else {
        Err(BimcostError::Submission {
            urn: urn.to_string(),
            reason: "not a base64-encoded object URN".to_string(),
        })
    }
}

// =============================================================================
// Service Seam
// =============================================================================

/// Remote operations the tracker depends on.
pub trait TranslationService {
    /// Register a translation job for `urn`.
    fn submit_job(&self, urn: &str) -> impl Future<Output = Result<()>> + Send;

    /// Read the current manifest for `urn`.
    fn fetch_manifest(&self, urn: &str) -> impl Future<Output = Result<RemoteManifest>> + Send;
}

impl<T: TranslationService + Send + Sync> TranslationService for Arc<T> {
    fn submit_job(&self, urn: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).submit_job(urn)
    }

    fn fetch_manifest(&self, urn: &str) -> impl Future<Output = Result<RemoteManifest>> + Send {
        (**self).fetch_manifest(urn)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: String,
}

impl TranslationService for ForgeClient {
    async fn submit_job(&self, urn: &str) -> Result<()> {
        let bearer = self.tokens().bearer().await?;
        let response = self
            .http()
            .post(self.url("/modelderivative/v2/designdata/job"))
            .bearer_auth(bearer)
            .header("x-ads-force", "true")
            .json(&json!({
                "input": { "urn": urn },
                "output": {
                    "formats": [{ "type": "svf2", "views": ["2d", "3d"] }]
                }
            }))
            .send()
            .await
            .map_err(|e| send_error(&e, DEFAULT_TIMEOUT))?;
        ensure_success(response, "submit translation").await?;
        Ok(())
    }

    async fn fetch_manifest(&self, urn: &str) -> Result<RemoteManifest> {
        let bearer = self.tokens().bearer().await?;
        let url = self.url(&format!("/modelderivative/v2/designdata/{urn}/manifest"));
        let manifest: ManifestResponse = fetch_json(self.http(), &url, &bearer, "manifest").await?;
        Ok(RemoteManifest {
            status: RemoteStatus::from_wire(&manifest.status),
            progress: parse_progress(&manifest.progress),
        })
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// Fixed polling schedule. The interval is never tightened adaptively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

/// Drives [`TranslationJob`] records through their lifecycle.
#[derive(Debug, Clone)]
pub struct JobTracker<S> {
    service: S,
    policy: PollPolicy,
}

impl<S: TranslationService + Sync> JobTracker<S> {
    #[must_use]
    pub const fn new(service: S, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Submit a translation job for an uploaded object.
    ///
    /// # Errors
    ///
    /// Returns `Submission` for a malformed URN or when the service rejects
    /// the job (HTTP 400/404/406/415/422); `Credential` and transport errors
    /// pass through unchanged.
    pub async fn submit(&self, urn: &str) -> Result<TranslationJob> {
        validate_urn(urn)?;
        match self.service.submit_job(urn).await {
            Ok(()) => {
                tracing::info!(urn, "Translation job submitted");
                Ok(TranslationJob::submitted(urn))
            }
            Err(BimcostError::ForgeApi {
                status_code: 400 | 404 | 406 | 415 | 422,
                message,
                ..
            }) => Err(BimcostError::Submission {
                urn: urn.to_string(),
                reason: message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Start tracking a job that was submitted earlier. No remote call.
    ///
    /// # Errors
    ///
    /// Returns `Submission` for a malformed URN.
    pub fn track(&self, urn: &str) -> Result<TranslationJob> {
        validate_urn(urn)?;
        Ok(TranslationJob::submitted(urn))
    }

    /// Query the remote status once and return the advanced record.
    ///
    /// Terminal jobs are returned unchanged without a remote call. Every
    /// other call counts one attempt; a transient query failure is a missed
    /// attempt, not a job failure. Reaching the attempt ceiling without a
    /// terminal remote status yields `TimedOut`.
    ///
    /// # Errors
    ///
    /// Returns `Credential` when the service rejects our credentials; more
    /// polls cannot succeed until the configuration changes.
    pub async fn poll(&self, mut job: TranslationJob) -> Result<TranslationJob> {
        if job.status.is_terminal() {
            return Ok(job);
        }

        job.poll_attempts = job.poll_attempts.saturating_add(1);
        job.last_polled_at = Some(Utc::now());

        match self.service.fetch_manifest(&job.urn).await {
            Ok(manifest) => apply_manifest(&mut job, manifest),
            Err(e @ BimcostError::Credential(_)) => {
                tracing::error!(
                    urn = %job.urn,
                    attempt = job.poll_attempts,
                    error = %e,
                    "Status poll rejected, stopping"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    urn = %job.urn,
                    attempt = job.poll_attempts,
                    error = %e,
                    "Status poll failed, counting as missed attempt"
                );
                if job.status == JobStatus::Submitted {
                    job.status = JobStatus::InProgress;
                }
            }
        }

        if !job.status.is_terminal() && job.poll_attempts >= self.policy.max_attempts {
            tracing::warn!(
                urn = %job.urn,
                attempts = job.poll_attempts,
                "Stopped waiting for translation"
            );
            job.status = JobStatus::TimedOut;
        }

        tracing::debug!(
            urn = %job.urn,
            attempt = job.poll_attempts,
            status = %job.status,
            progress = job.progress_percent,
            "Polled translation status"
        );
        Ok(job)
    }

    /// Poll until the job is terminal or `cancel` fires.
    ///
    /// The first poll runs immediately, later ones every `policy.interval`.
    /// `on_update` sees the record after each poll. On cancellation the
    /// current (possibly non-terminal) record is returned.
    ///
    /// # Errors
    ///
    /// Stops at the first poll error; see [`JobTracker::poll`].
    pub async fn wait<F>(
        &self,
        mut job: TranslationJob,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> Result<TranslationJob>
    where
        F: FnMut(&TranslationJob) + Send,
    {
        loop {
            if job.status.is_terminal() || cancel.is_cancelled() {
                return Ok(job);
            }
            job = self.poll(job).await?;
            on_update(&job);
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!(urn = %job.urn, "Stopped polling on request");
                    return Ok(job);
                }
                () = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}

fn apply_manifest(job: &mut TranslationJob, manifest: RemoteManifest) {
    match manifest.status {
        RemoteStatus::Success => {
            job.status = JobStatus::Success;
            job.progress_percent = 100;
        }
        RemoteStatus::Failed | RemoteStatus::Timeout => job.status = JobStatus::Failed,
        RemoteStatus::Pending | RemoteStatus::InProgress => {
            job.status = JobStatus::InProgress;
            if let Some(p) = manifest.progress {
                // The remote value may dip; ours never does.
                job.progress_percent = job.progress_percent.max(p.min(99));
            }
        }
    }
}
