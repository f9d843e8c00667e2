//! Multi-provider AI gateway.
//!
//! Selects a backend from the capability table, bounds the call with a
//! fixed timeout, and parses structured responses leniently. There is no
//! cross-provider retry and no response cache: every call goes out fresh,
//! and a timeout is returned to the caller as-is.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use super::http::build_client;
use super::provider::{Capability, ProviderTable};
use crate::error::{BimcostError, Result};
use crate::providers::{self, Prompt};

/// Default upper bound for a single provider call.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(60);

/// Routes prompts to the preferred available provider.
#[derive(Debug, Clone)]
pub struct AiGateway {
    table: ProviderTable,
    client: Client,
    timeout: Duration,
}

impl AiGateway {
    /// Create a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(table: ProviderTable, call_timeout: Duration) -> Result<Self> {
        // The client timeout sits above the call bound so the gateway's own
        // timeout is the one callers observe.
        let client = build_client(call_timeout + Duration::from_secs(5))?;
        Ok(Self::with_client(table, client, call_timeout))
    }

    /// Create a gateway around an existing client.
    #[must_use]
    pub fn with_client(table: ProviderTable, client: Client, call_timeout: Duration) -> Self {
        Self {
            table,
            client,
            timeout: call_timeout,
        }
    }

    /// The resolved capability table.
    #[must_use]
    pub const fn table(&self) -> &ProviderTable {
        &self.table
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one prompt against the preferred provider and return raw text.
    ///
    /// # Errors
    ///
    /// - `NoProviderAvailable` before any network call when no provider can
    ///   serve `capability`
    /// - `ProviderTimeout` when the call exceeds the configured bound
    /// - `ProviderApi`/`Network` for backend failures
    pub async fn complete(&self, capability: Capability, prompt: &Prompt) -> Result<String> {
        let descriptor = self.table.select(capability)?;
        let provider = descriptor.provider;

        tracing::info!(
            provider = provider.cli_name(),
            capability = capability.label(),
            "Selected AI provider"
        );

        let start = Instant::now();
        let outcome = timeout(
            self.timeout,
            providers::complete(&self.client, descriptor, capability, prompt),
        )
        .await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(text)) => {
                tracing::debug!(provider = provider.cli_name(), duration_ms, "AI call succeeded");
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    provider = provider.cli_name(),
                    duration_ms,
                    error = %e,
                    "AI call failed"
                );
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    provider = provider.cli_name(),
                    seconds = self.timeout.as_secs(),
                    "AI call timed out"
                );
                Err(BimcostError::ProviderTimeout {
                    provider: provider.cli_name().to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Run a JSON-mode prompt and parse the reply into `T`.
    ///
    /// A malformed reply yields `T::default()` rather than an error.
    ///
    /// # Errors
    ///
    /// Same as [`AiGateway::complete`]; parsing never fails.
    pub async fn complete_json<T>(&self, capability: Capability, prompt: &Prompt) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let mut prompt = prompt.clone();
        prompt.json = true;
        let raw = self.complete(capability, &prompt).await?;
        Ok(parse_json_or_default(&raw))
    }
}

/// Parse model output as JSON, tolerating Markdown code fences.
///
/// Returns `T::default()` (and logs a warning) when the text is not valid
/// JSON for `T`.
#[must_use]
pub fn parse_json_or_default<T>(raw: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let body = strip_code_fences(raw);
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                error = %e,
                len = raw.len(),
                "AI response was not valid JSON, using empty result"
            );
            T::default()
        }
    }
}

/// Remove a surrounding ```json ... ``` fence, if present.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.find('\n').map_or("", |i| &rest[i + 1..]);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
