//! Two-legged OAuth token provider for the Forge APIs.
//!
//! The last issued token is cached in memory behind an async `RwLock`.
//! Readers share the lock; a refresh takes the write lock and re-checks the
//! cache first, so concurrent callers see either the old valid token or the
//! new one and only one exchange is in flight.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::core::http::{DEFAULT_TIMEOUT, send_error, truncate};
use crate::error::{BimcostError, Result};

/// Scopes for server-side upload and translation calls.
pub const INTERNAL_SCOPE: &str = "data:read data:write data:create bucket:create bucket:read";

/// Read-only scope handed to viewers.
pub const VIEWER_SCOPE: &str = "viewables:read";

/// Treat a token as expired this long before the server says it is.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Forge application credentials.
#[derive(Clone)]
pub struct ForgeCredentials {
    client_id: String,
    client_secret: String,
}

impl ForgeCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for ForgeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Bearer token with its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Seconds until expiry, floored at zero.
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }

    /// Expiry as Unix epoch seconds.
    #[must_use]
    pub fn expires_at_epoch(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Whether the token is still usable with `margin` to spare.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin =
            chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        now + margin < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3599
}

/// Issues and caches access tokens for one scope set.
#[derive(Debug)]
pub struct TokenProvider {
    http: Client,
    token_url: String,
    credentials: Option<ForgeCredentials>,
    scope: String,
    cache: RwLock<Option<AccessToken>>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(
        http: Client,
        base_url: &str,
        credentials: Option<ForgeCredentials>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/authentication/v2/token", base_url.trim_end_matches('/')),
            credentials,
            scope: scope.into(),
            cache: RwLock::new(None),
        }
    }

    /// Whether client credentials are configured at all.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Return the cached token if unexpired, otherwise exchange credentials
    /// for a new one.
    ///
    /// # Errors
    ///
    /// Returns `Credential` when credentials are absent or rejected; this is
    /// never retried. Other failures surface as `Network`/`ForgeApi`.
    pub async fn access_token(&self) -> Result<AccessToken> {
        let Some(credentials) = &self.credentials else {
            return Err(BimcostError::Credential(
                "FORGE_CLIENT_ID and FORGE_CLIENT_SECRET are not configured".to_string(),
            ));
        };

        {
            let cached = self.cache.read().await;
            if let Some(token) = cached
                .as_ref()
                .filter(|t| t.is_fresh(Utc::now(), EXPIRY_MARGIN))
            {
                return Ok(token.clone());
            }
        }

        let mut slot = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Utc::now(), EXPIRY_MARGIN)) {
            return Ok(token.clone());
        }

        let token = self.exchange(credentials).await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Token string for an `Authorization: Bearer` header.
    ///
    /// # Errors
    ///
    /// Same as [`TokenProvider::access_token`].
    pub async fn bearer(&self) -> Result<String> {
        Ok(self.access_token().await?.token)
    }

    async fn exchange(&self, credentials: &ForgeCredentials) -> Result<AccessToken> {
        tracing::debug!(scope = %self.scope, "Requesting Forge access token");

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| send_error(&e, DEFAULT_TIMEOUT))?;

        let status = response.status();
        if matches!(status.as_u16(), 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_default();
            return Err(BimcostError::Credential(format!(
                "token exchange rejected (HTTP {}): {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BimcostError::ForgeApi {
                operation: "authenticate".to_string(),
                status_code: status.as_u16(),
                message: truncate(&body, 300),
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| BimcostError::ParseResponse(format!("token response: {e}")))?;

        let token = AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in.max(0)),
        };
        tracing::debug!(expires_at = %token.expires_at, "Forge access token refreshed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_respects_margin() {
        let now = Utc::now();
        let token = AccessToken {
            token: "t".to_string(),
            expires_at: now + chrono::Duration::seconds(90),
        };
        assert!(token.is_fresh(now, EXPIRY_MARGIN));
        assert!(!token.is_fresh(now + chrono::Duration::seconds(31), EXPIRY_MARGIN));
        assert_eq!(token.expires_in(now), 90);
        assert_eq!(token.expires_in(now + chrono::Duration::seconds(200)), 0);
    }

    #[test]
    fn debug_hides_secrets() {
        let creds = ForgeCredentials::new("id", "very-secret");
        assert!(!format!("{creds:?}").contains("very-secret"));
        let token = AccessToken {
            token: "bearer-value".to_string(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{token:?}").contains("bearer-value"));
    }

    #[tokio::test]
    async fn missing_credentials_is_credential_error() {
        let provider = TokenProvider::new(Client::new(), "http://127.0.0.1:9", None, INTERNAL_SCOPE);
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, BimcostError::Credential(_)));
        assert!(!err.is_retryable());
    }
}
