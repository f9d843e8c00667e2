//! Shared Forge API client.

use reqwest::Client;

use super::auth::{ForgeCredentials, INTERNAL_SCOPE, TokenProvider, VIEWER_SCOPE};
use crate::core::http::default_client;
use crate::error::Result;
use crate::storage::AppConfig;

/// Default chunk size for signed part uploads.
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Handle to one Forge application and bucket.
///
/// Holds the HTTP client, the two token caches (internal and viewer), and
/// the object-store layout. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct ForgeClient {
    http: Client,
    base_url: String,
    bucket_key: String,
    chunk_size: u64,
    tokens: TokenProvider,
    viewer_tokens: TokenProvider,
    bucket_ready: tokio::sync::OnceCell<()>,
}

impl ForgeClient {
    /// Build from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            default_client()?,
            &config.config.forge.base_url,
            config.bucket_key(),
            config.forge_credentials(),
            config.chunk_size(),
        ))
    }

    #[must_use]
    pub fn new(
        http: Client,
        base_url: &str,
        bucket_key: impl Into<String>,
        credentials: Option<ForgeCredentials>,
        chunk_size: u64,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            tokens: TokenProvider::new(http.clone(), &base_url, credentials.clone(), INTERNAL_SCOPE),
            viewer_tokens: TokenProvider::new(http.clone(), &base_url, credentials, VIEWER_SCOPE),
            http,
            base_url,
            bucket_key: bucket_key.into(),
            chunk_size,
            bucket_ready: tokio::sync::OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.http
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn bucket_key(&self) -> &str {
        &self.bucket_key
    }

    /// Preferred chunk size for part uploads.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Token cache for server-side calls.
    #[must_use]
    pub const fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Token cache for the read-only viewer scope.
    #[must_use]
    pub const fn viewer_tokens(&self) -> &TokenProvider {
        &self.viewer_tokens
    }

    /// Whether client credentials are configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.tokens.is_configured()
    }

    /// Absolute URL for an API path.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) const fn bucket_ready(&self) -> &tokio::sync::OnceCell<()> {
        &self.bucket_ready
    }
}
