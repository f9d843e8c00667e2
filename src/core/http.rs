//! HTTP client utilities.
//!
//! Provides the shared HTTP client and response helpers used by the Forge
//! client and the AI providers.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};

use crate::error::{BimcostError, Result};

/// Default timeout for HTTP requests to the translation service.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single chunk PUT to the object store.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("bimcost/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BimcostError::Network(e.to_string()))
}

/// Get or create a default HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn default_client() -> Result<Client> {
    build_client(DEFAULT_TIMEOUT)
}

/// Translate a reqwest send error into the crate taxonomy.
#[must_use]
pub fn send_error(err: &reqwest::Error, timeout: Duration) -> BimcostError {
    if err.is_timeout() {
        BimcostError::Timeout(timeout.as_secs())
    } else {
        BimcostError::Network(err.to_string())
    }
}

/// Pass a successful response through, or turn it into a `ForgeApi` error
/// carrying the status code and the (truncated) body.
///
/// # Errors
///
/// Returns `ForgeApi` for any non-2xx status.
pub async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BimcostError::ForgeApi {
        operation: operation.to_string(),
        status_code: status.as_u16(),
        message: truncate(&body, 300),
    })
}

/// Fetch JSON from a URL with a bearer token.
///
/// # Errors
///
/// Returns error on network failure, non-success status, or JSON parse failure.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    bearer: &str,
    operation: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| send_error(&e, DEFAULT_TIMEOUT))?;

    let response = ensure_success(response, operation).await?;

    response
        .json()
        .await
        .map_err(|e| BimcostError::ParseResponse(format!("{operation}: {e}")))
}

/// Truncate a string to at most `max` characters, marking the cut.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
