//! HTTP surface.
//!
//! Thin axum handlers over the Forge client, the job tracker and the AI
//! gateway. Handlers own no logic beyond request decoding and response
//! shaping; every error leaves through [`BimcostError`]'s `IntoResponse`.
//!
//! [`BimcostError`]: crate::error::BimcostError

pub mod ai;
pub mod forge;
pub mod status;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::core::gateway::AiGateway;
use crate::core::models::{JobStatus, TranslationJob};
use crate::core::rates::RateTable;
use crate::error::Result;
use crate::forge::{ForgeClient, JobTracker, UploadPolicy};
use crate::storage::AppConfig;

/// Seconds a terminal job stays registered after its last poll.
pub const JOB_RETENTION_SECS: i64 = 3600;

/// Tracker over the shared Forge client.
pub type ForgeTracker = JobTracker<Arc<ForgeClient>>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub forge: Arc<ForgeClient>,
    pub tracker: Arc<ForgeTracker>,
    /// In-memory job registry keyed by URN.
    pub jobs: Arc<RwLock<HashMap<String, TranslationJob>>>,
    pub gateway: Arc<AiGateway>,
    pub rates: Arc<RateTable>,
    pub upload_policy: UploadPolicy,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build every component from the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let forge = Arc::new(ForgeClient::from_config(config)?);
        let gateway = AiGateway::new(config.provider_table(), config.ai_timeout())?;
        let tracker = JobTracker::new(Arc::clone(&forge), config.poll_policy());
        Ok(Self::new(
            forge,
            tracker,
            gateway,
            config.rate_table(),
            config.upload_policy(),
        ))
    }

    #[must_use]
    pub fn new(
        forge: Arc<ForgeClient>,
        tracker: ForgeTracker,
        gateway: AiGateway,
        rates: RateTable,
        upload_policy: UploadPolicy,
    ) -> Self {
        Self {
            forge,
            tracker: Arc::new(tracker),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            gateway: Arc::new(gateway),
            rates: Arc::new(rates),
            upload_policy,
            startup_time: Utc::now(),
        }
    }

    /// Current record for `urn`, if one is registered.
    pub async fn job(&self, urn: &str) -> Option<TranslationJob> {
        self.jobs.read().await.get(urn).cloned()
    }

    /// Register a newly submitted job, replacing any earlier record for
    /// the same URN.
    pub async fn register_job(&self, job: TranslationJob) {
        let mut jobs = self.jobs.write().await;
        evict_expired(&mut jobs, Utc::now());
        jobs.insert(job.urn.clone(), job);
    }

    /// Fold a freshly polled record into the registry and return the
    /// merged view.
    ///
    /// A registered terminal record is never replaced by a non-terminal
    /// one, and progress never decreases. `TimedOut` records are dropped
    /// so the next request tracks the job afresh and sees the remote state.
    pub async fn record_job(&self, job: TranslationJob) -> TranslationJob {
        let mut jobs = self.jobs.write().await;
        evict_expired(&mut jobs, Utc::now());

        let merged = match jobs.remove(&job.urn) {
            Some(current) => current.merge(job),
            None => job,
        };
        if merged.status == JobStatus::TimedOut {
            tracing::debug!(urn = %merged.urn, "Dropped timed-out job from registry");
        } else {
            jobs.insert(merged.urn.clone(), merged.clone());
        }
        merged
    }
}

/// Remove terminal jobs last polled more than [`JOB_RETENTION_SECS`] ago.
fn evict_expired(jobs: &mut HashMap<String, TranslationJob>, now: DateTime<Utc>) {
    let retention = chrono::Duration::seconds(JOB_RETENTION_SECS);
    jobs.retain(|_, job| {
        !job.status.is_terminal()
            || job.last_polled_at.unwrap_or(job.submitted_at) + retention > now
    });
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(forge::forge_routes(state.upload_policy))
        .merge(ai::ai_routes())
        .merge(status::status_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns `Io` if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(urn: &str, status: JobStatus, polled_secs_ago: i64, now: DateTime<Utc>) -> TranslationJob {
        let mut job = TranslationJob::submitted(urn);
        job.status = status;
        job.submitted_at = now - chrono::Duration::seconds(polled_secs_ago + 60);
        job.last_polled_at = Some(now - chrono::Duration::seconds(polled_secs_ago));
        job
    }

    #[test]
    fn eviction_drops_only_stale_terminal_jobs() {
        let now = Utc::now();
        let mut jobs = HashMap::new();
        for j in [
            job("old-success", JobStatus::Success, JOB_RETENTION_SECS + 1, now),
            job("old-failed", JobStatus::Failed, JOB_RETENTION_SECS * 2, now),
            job("fresh-success", JobStatus::Success, 10, now),
            job("old-running", JobStatus::InProgress, JOB_RETENTION_SECS * 2, now),
        ] {
            jobs.insert(j.urn.clone(), j);
        }

        evict_expired(&mut jobs, now);

        let mut kept: Vec<_> = jobs.keys().map(String::as_str).collect();
        kept.sort_unstable();
        assert_eq!(kept, vec!["fresh-success", "old-running"]);
    }
}
