//! Binary upload channel.
//!
//! Two modes:
//! - **validating**: enforces the size ceiling and extension allow-list
//!   before any remote call, then streams the file to the object store
//!   through signed part URLs;
//! - **instant**: skips validation and discards the bytes after counting
//!   them. Used for throughput testing; makes no remote call.
//!
//! Object keys are derived from the caller's scope and the file name, so a
//! re-upload of the same file by the same caller overwrites the previous
//! object instead of creating a new one.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::client::ForgeClient;
use crate::core::http::{CHUNK_TIMEOUT, DEFAULT_TIMEOUT, ensure_success, send_error};
use crate::core::models::{UploadProgress, UploadSession};
use crate::error::{BimcostError, Result};

/// Default ceiling for the validating path.
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Extensions accepted by the validating path.
pub const ALLOWED_EXTENSIONS: &[&str] = &["rvt", "ifc", "dwg", "dxf"];

/// Signed upload requests are limited to this many parts.
pub const MAX_PARTS: u64 = 25;

/// Smallest part the object store accepts (except the last).
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Read size on the instant path.
const DRAIN_CHUNK: u64 = 1024 * 1024;

// =============================================================================
// Policy
// =============================================================================

/// Type and size policy for the validating path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    max_bytes: u64,
    allowed_extensions: &'static [&'static str],
}

impl UploadPolicy {
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            allowed_extensions: ALLOWED_EXTENSIONS,
        }
    }

    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reject sizes above the ceiling.
    ///
    /// # Errors
    ///
    /// Returns `UploadRejected { too_large: true }`.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(BimcostError::UploadRejected {
                reason: format!(
                    "file is {size} bytes, limit is {} bytes",
                    self.max_bytes
                ),
                too_large: true,
            });
        }
        Ok(())
    }

    /// Reject extensions outside the allow-list.
    ///
    /// # Errors
    ///
    /// Returns `UploadRejected { too_large: false }`.
    pub fn check_extension(&self, file_name: &str) -> Result<()> {
        let ext = extension(file_name);
        if ext
            .as_deref()
            .is_some_and(|e| self.allowed_extensions.contains(&e))
        {
            return Ok(());
        }
        Err(BimcostError::UploadRejected {
            reason: format!(
                "{} is not an accepted model format (allowed: {})",
                ext.map_or_else(|| "a file without extension".to_string(), |e| format!(".{e}")),
                self.allowed_extensions
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            too_large: false,
        })
    }

    /// Full validation for a declared file.
    ///
    /// # Errors
    ///
    /// Returns `UploadRejected` on the first violated rule.
    pub fn check(&self, file_name: &str, size: u64) -> Result<()> {
        self.check_extension(file_name)?;
        self.check_size(size)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES)
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

// =============================================================================
// Keys and URNs
// =============================================================================

/// Content type hint for a model file.
#[must_use]
pub fn mime_hint(file_name: &str) -> &'static str {
    match extension(file_name).as_deref() {
        Some("ifc") => "application/x-step",
        Some("dwg") => "image/vnd.dwg",
        Some("dxf") => "image/vnd.dxf",
        _ => "application/octet-stream",
    }
}

/// Strip directories and replace characters the object store rejects.
#[must_use]
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "model".to_string()
    } else {
        cleaned
    }
}

/// Deterministic object key for `file_name` uploaded under `scope`.
#[must_use]
pub fn object_key(scope: &str, file_name: &str) -> String {
    let digest = hex::encode(Sha256::digest(scope.as_bytes()));
    format!("{}-{}", &digest[..12], sanitize_file_name(file_name))
}

/// Canonical URN: URL-safe, unpadded base64 of the object id.
#[must_use]
pub fn encode_urn(bucket_key: &str, object_key: &str) -> String {
    URL_SAFE_NO_PAD.encode(format!("urn:adsk.objects:os.object:{bucket_key}/{object_key}"))
}

/// Decode a URN back to its object id, accepting padded or standard
/// alphabets as produced by other tools.
#[must_use]
pub fn decode_urn(urn: &str) -> Option<String> {
    let normalized: String = urn
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    decoded.starts_with("urn:").then_some(decoded)
}

/// Choose the part size and count for a file: the preferred chunk size,
/// grown when the file would otherwise need more than [`MAX_PARTS`] parts.
#[must_use]
pub fn plan_parts(file_size: u64, preferred_chunk: u64) -> (u64, u64) {
    let mut chunk = preferred_chunk.max(MIN_CHUNK_SIZE);
    if file_size.div_ceil(chunk) > MAX_PARTS {
        chunk = file_size.div_ceil(MAX_PARTS);
    }
    let parts = file_size.div_ceil(chunk).max(1);
    (chunk, parts)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUpload {
    upload_key: String,
    #[serde(default)]
    urls: Vec<String>,
}

// =============================================================================
// Validating Path
// =============================================================================

impl ForgeClient {
    /// Create the configured bucket with a transient retention policy.
    /// An existing bucket (HTTP 409) counts as success. Runs at most once
    /// successfully per client.
    ///
    /// # Errors
    ///
    /// Returns `Credential`, `Network`, or `ForgeApi` failures.
    pub async fn ensure_bucket(&self) -> Result<()> {
        self.bucket_ready()
            .get_or_try_init(|| self.create_bucket())
            .await
            .map(|_| ())
    }

    async fn create_bucket(&self) -> Result<()> {
        let bearer = self.tokens().bearer().await?;
        let response = self
            .http()
            .post(self.url("/oss/v2/buckets"))
            .bearer_auth(bearer)
            .json(&json!({
                "bucketKey": self.bucket_key(),
                "policyKey": "transient",
            }))
            .send()
            .await
            .map_err(|e| send_error(&e, DEFAULT_TIMEOUT))?;

        if response.status().as_u16() == 409 {
            tracing::debug!(bucket = self.bucket_key(), "Bucket already exists");
            return Ok(());
        }
        ensure_success(response, "create bucket").await?;
        tracing::info!(bucket = self.bucket_key(), "Created bucket");
        Ok(())
    }

    /// Upload through the validating path.
    ///
    /// Policy violations are reported before any remote call. `on_progress`
    /// is invoked after every part with a strictly larger byte count.
    ///
    /// # Errors
    ///
    /// - `UploadRejected` for policy violations
    /// - `Credential` when the token exchange fails
    /// - `Upload` with the byte offset reached for transfer failures; the
    ///   caller must restart from scratch
    pub async fn upload<R, F>(
        &self,
        mut reader: R,
        file_name: &str,
        file_size: u64,
        scope: &str,
        policy: &UploadPolicy,
        mut on_progress: F,
    ) -> Result<UploadSession>
    where
        R: AsyncRead + Unpin + Send,
        F: FnMut(UploadProgress) + Send,
    {
        policy.check(file_name, file_size)?;

        let mut session = UploadSession::new(file_name, file_size, mime_hint(file_name));
        let bearer = self.tokens().bearer().await?;
        self.ensure_bucket().await?;

        let key = object_key(scope, file_name);
        let (chunk_size, parts) = plan_parts(file_size, self.chunk_size());
        let signed_path = format!(
            "/oss/v2/buckets/{}/objects/{key}/signeds3upload",
            self.bucket_key()
        );

        tracing::info!(
            file = file_name,
            bytes = file_size,
            parts,
            object_key = %key,
            "Starting upload"
        );

        let signed = self
            .http()
            .get(self.url(&signed_path))
            .bearer_auth(&bearer)
            .query(&[("parts", parts.to_string()), ("firstPart", "1".to_string())])
            .send()
            .await
            .map_err(|e| session.fail(format!("requesting part URLs: {e}")))?;
        let signed = match ensure_success(signed, "signed upload").await {
            Ok(response) => response,
            Err(e) => return Err(session.fail(e.to_string())),
        };
        let signed: SignedUpload = signed
            .json()
            .await
            .map_err(|e| session.fail(format!("reading part URLs: {e}")))?;
        let part_count = usize::try_from(parts).unwrap_or(usize::MAX);
        if signed.urls.len() < part_count {
            return Err(session.fail(format!(
                "object store issued {} part URLs, {parts} needed",
                signed.urls.len()
            )));
        }

        session.begin();
        for (index, url) in signed.urls.iter().take(part_count).enumerate() {
            let chunk = read_chunk(&mut reader, chunk_size)
                .await
                .map_err(|e| session.fail(format!("reading source: {e}")))?;
            if chunk.is_empty() && session.bytes_transferred() < file_size {
                return Err(session.fail("source ended before the declared size"));
            }
            let len = chunk.len() as u64;

            let put = self
                .http()
                .put(url)
                .timeout(CHUNK_TIMEOUT)
                .body(chunk)
                .send()
                .await
                .map_err(|e| session.fail(format!("part {}: {e}", index + 1)))?;
            if !put.status().is_success() {
                return Err(session.fail(format!(
                    "part {} rejected with HTTP {}",
                    index + 1,
                    put.status().as_u16()
                )));
            }

            let progress = session.advance(len)?;
            tracing::debug!(
                part = index + 1,
                bytes = progress.bytes_transferred,
                "Uploaded part"
            );
            on_progress(progress);
        }

        if session.bytes_transferred() != file_size {
            return Err(session.fail(format!(
                "transferred {} of {file_size} declared bytes",
                session.bytes_transferred()
            )));
        }

        let finalize = self
            .http()
            .post(self.url(&signed_path))
            .bearer_auth(&bearer)
            .json(&json!({ "uploadKey": signed.upload_key }))
            .send()
            .await
            .map_err(|e| session.fail(format!("completing upload: {e}")))?;
        if let Err(e) = ensure_success(finalize, "complete upload").await {
            return Err(session.fail(e.to_string()));
        }

        let urn = encode_urn(self.bucket_key(), &key);
        tracing::info!(file = file_name, urn = %urn, "Upload complete");
        session.complete(urn);
        Ok(session)
    }

    /// Upload a local file through the validating path.
    ///
    /// # Errors
    ///
    /// Same as [`ForgeClient::upload`], plus `Io` if the file cannot be opened.
    pub async fn upload_file<F>(
        &self,
        path: &Path,
        scope: &str,
        policy: &UploadPolicy,
        on_progress: F,
    ) -> Result<UploadSession>
    where
        F: FnMut(UploadProgress) + Send,
    {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Checked before opening so a rejected path never touches the disk.
        policy.check_extension(&file_name)?;
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        self.upload(file, &file_name, size, scope, policy, on_progress)
            .await
    }

    /// Instant path under this client's bucket. See [`upload_instant`].
    ///
    /// # Errors
    ///
    /// Same as [`upload_instant`].
    pub async fn upload_instant<R, F>(
        &self,
        reader: R,
        file_name: &str,
        declared_size: Option<u64>,
        scope: &str,
        on_progress: F,
    ) -> Result<UploadSession>
    where
        R: AsyncRead + Unpin + Send,
        F: FnMut(UploadProgress) + Send,
    {
        upload_instant(
            reader,
            file_name,
            declared_size,
            self.bucket_key(),
            scope,
            on_progress,
        )
        .await
    }
}

// =============================================================================
// Instant Path
// =============================================================================

/// Read and discard the stream, reporting progress as it goes.
///
/// No validation and no remote call. The session ends `Uploaded` with the
/// URN the validating path would have produced; no object exists behind it.
/// Without a declared size the total is known only at the end, so progress
/// events report the running count as both fields.
///
/// # Errors
///
/// Returns `Upload` if reading fails, or if the stream is longer or shorter
/// than a declared size.
pub async fn upload_instant<R, F>(
    mut reader: R,
    file_name: &str,
    declared_size: Option<u64>,
    bucket_key: &str,
    scope: &str,
    mut on_progress: F,
) -> Result<UploadSession>
where
    R: AsyncRead + Unpin + Send,
    F: FnMut(UploadProgress) + Send,
{
    let mut received: u64 = 0;
    let mut session = declared_size.map(|size| {
        let mut s = UploadSession::new(file_name, size, mime_hint(file_name));
        s.begin();
        s
    });

    loop {
        let chunk = match read_chunk(&mut reader, DRAIN_CHUNK).await {
            Ok(chunk) => chunk,
            Err(e) => {
                return Err(match session.as_mut() {
                    Some(s) => s.fail(format!("reading source: {e}")),
                    None => BimcostError::Upload {
                        file_name: file_name.to_string(),
                        offset: received,
                        reason: format!("reading source: {e}"),
                    },
                });
            }
        };
        if chunk.is_empty() {
            break;
        }
        received += chunk.len() as u64;
        let progress = match session.as_mut() {
            Some(s) => s.advance(chunk.len() as u64)?,
            None => UploadProgress {
                bytes_transferred: received,
                file_size_bytes: received,
            },
        };
        on_progress(progress);
    }

    let mut session = match session {
        Some(mut s) => {
            if s.bytes_transferred() != s.file_size_bytes() {
                return Err(s.fail(format!(
                    "stream ended after {} of {} declared bytes",
                    s.bytes_transferred(),
                    s.file_size_bytes()
                )));
            }
            s
        }
        None => {
            let mut s = UploadSession::new(file_name, received, mime_hint(file_name));
            s.begin();
            s.advance(received)?;
            s
        }
    };

    let urn = encode_urn(bucket_key, &object_key(scope, file_name));
    tracing::info!(file = file_name, bytes = received, "Instant upload drained");
    session.complete(urn);
    Ok(session)
}

async fn read_chunk<R>(reader: &mut R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(usize::try_from(limit.min(DRAIN_CHUNK * 32)).unwrap_or(0));
    reader.take(limit).read_to_end(&mut buf).await?;
    Ok(buf)
}
