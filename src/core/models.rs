//! Core data models for the estimation pipeline.
//!
//! Upload sessions, translation jobs, and extracted element records. The
//! wire shapes returned by the HTTP surface live next to the types they
//! are derived from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BimcostError, Result};

/// Absolute tolerance used when checking `total == quantity * unit_cost`.
pub const COST_TOLERANCE: f64 = 0.01;

// =============================================================================
// Upload Session
// =============================================================================

/// Lifecycle of a single file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadState {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }
}

/// Progress notification emitted after each transferred chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub file_size_bytes: u64,
}

impl UploadProgress {
    /// Completed fraction in percent (0-100).
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.file_size_bytes == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.bytes_transferred as f64 / self.file_size_bytes as f64;
        (ratio * 100.0).min(100.0)
    }
}

/// One in-flight or completed file transfer.
///
/// Fields are private so the invariants hold: the URN is present exactly
/// when the state is `Uploaded`, and `bytes_transferred` never decreases or
/// exceeds the declared size.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    file_name: String,
    file_size_bytes: u64,
    mime_hint: String,
    object_urn: Option<String>,
    state: UploadState,
    bytes_transferred: u64,
}

impl UploadSession {
    /// Create a pending session for a selected file.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        file_size_bytes: u64,
        mime_hint: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size_bytes,
            mime_hint: mime_hint.into(),
            object_urn: None,
            state: UploadState::Pending,
            bytes_transferred: 0,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub const fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    #[must_use]
    pub fn mime_hint(&self) -> &str {
        &self.mime_hint
    }

    #[must_use]
    pub fn object_urn(&self) -> Option<&str> {
        self.object_urn.as_deref()
    }

    #[must_use]
    pub const fn state(&self) -> UploadState {
        self.state
    }

    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Move from `Pending` to `Uploading`.
    pub fn begin(&mut self) {
        if self.state == UploadState::Pending {
            self.state = UploadState::Uploading;
        }
    }

    /// Record that `chunk_len` more bytes reached the remote store.
    ///
    /// # Errors
    ///
    /// Fails if the session is not uploading, or if the new total would
    /// exceed the declared size.
    pub fn advance(&mut self, chunk_len: u64) -> Result<UploadProgress> {
        if self.state != UploadState::Uploading {
            return Err(BimcostError::Upload {
                file_name: self.file_name.clone(),
                offset: self.bytes_transferred,
                reason: format!("session is {:?}, not uploading", self.state),
            });
        }
        let next = self.bytes_transferred.saturating_add(chunk_len);
        if next > self.file_size_bytes {
            return Err(BimcostError::Upload {
                file_name: self.file_name.clone(),
                offset: self.bytes_transferred,
                reason: format!(
                    "stream produced more than the declared {} bytes",
                    self.file_size_bytes
                ),
            });
        }
        self.bytes_transferred = next;
        Ok(self.progress())
    }

    /// Current progress snapshot.
    #[must_use]
    pub const fn progress(&self) -> UploadProgress {
        UploadProgress {
            bytes_transferred: self.bytes_transferred,
            file_size_bytes: self.file_size_bytes,
        }
    }

    /// Transition to `Uploaded`, assigning the object URN. No-op when terminal.
    pub fn complete(&mut self, urn: String) {
        if self.state.is_terminal() {
            return;
        }
        self.object_urn = Some(urn);
        self.state = UploadState::Uploaded;
    }

    /// Transition to `Failed` and build the error describing where it stopped.
    /// Returns the error unchanged in meaning when already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> BimcostError {
        if !self.state.is_terminal() {
            self.state = UploadState::Failed;
        }
        BimcostError::Upload {
            file_name: self.file_name.clone(),
            offset: self.bytes_transferred,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Translation Job
// =============================================================================

/// Status of a translation job as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Success,
    Failed,
    /// We stopped waiting; the remote job may still finish.
    TimedOut,
}

impl JobStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::TimedOut)
    }

    /// Status string exposed by the status endpoint.
    #[must_use]
    pub const fn wire_label(self) -> &'static str {
        match self {
            Self::Submitted | Self::InProgress => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::TimedOut => "timeout",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::InProgress => "inprogress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::TimedOut => "timedout",
        };
        write!(f, "{s}")
    }
}

/// Asynchronous conversion of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationJob {
    pub urn: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub poll_attempts: u32,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

impl TranslationJob {
    /// Job freshly registered with the remote service.
    #[must_use]
    pub fn submitted(urn: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            status: JobStatus::Submitted,
            progress_percent: 0,
            poll_attempts: 0,
            last_polled_at: None,
            submitted_at: Utc::now(),
        }
    }

    /// Whether element extraction is valid for this job.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// Fold a later observation of the same job into this record.
    ///
    /// A terminal record is kept as-is. Otherwise the newer status wins,
    /// while progress and the attempt count never decrease.
    #[must_use]
    pub fn merge(self, newer: Self) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        Self {
            progress_percent: self.progress_percent.max(newer.progress_percent),
            poll_attempts: self.poll_attempts.max(newer.poll_attempts),
            last_polled_at: self.last_polled_at.max(newer.last_polled_at),
            submitted_at: self.submitted_at,
            ..newer
        }
    }
}

// =============================================================================
// Element Records
// =============================================================================

/// Numeric amount with its unit of measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub amount: f64,
    pub unit: String,
}

impl Quantity {
    #[must_use]
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }

    /// One counted item.
    #[must_use]
    pub fn each() -> Self {
        Self::new(1.0, "ea")
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unit == "ea" {
            write!(f, "{} {}", self.amount, self.unit)
        } else {
            write!(f, "{:.2} {}", self.amount, self.unit)
        }
    }
}

/// One construction-quantity line derived from a translated model.
///
/// Immutable once built; `total_cost` is always derived from the quantity
/// and the unit cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    element_id: String,
    category: String,
    name: String,
    quantity: Quantity,
    unit_cost: f64,
    total_cost: f64,
}

impl ElementRecord {
    #[must_use]
    pub fn new(
        element_id: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
        quantity: Quantity,
        unit_cost: f64,
    ) -> Self {
        let total_cost = quantity.amount * unit_cost;
        Self {
            element_id: element_id.into(),
            category: category.into(),
            name: name.into(),
            quantity,
            unit_cost,
            total_cost,
        }
    }

    #[must_use]
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    #[must_use]
    pub const fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    #[must_use]
    pub const fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Check `total_cost == quantity * unit_cost` within [`COST_TOLERANCE`].
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (self.total_cost - self.quantity.amount * self.unit_cost).abs() <= COST_TOLERANCE
    }

    /// Wire shape for the element extraction endpoint.
    #[must_use]
    pub fn to_line(&self) -> CostLine {
        CostLine {
            element: self.name.clone(),
            category: self.category.clone(),
            quantity: self.quantity.to_string(),
            unit_cost: round_cents(self.unit_cost),
            total: round_cents(self.total_cost),
        }
    }
}

/// Element extraction response row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub element: String,
    pub category: String,
    pub quantity: String,
    pub unit_cost: f64,
    pub total: f64,
}

/// Ordered cost lines plus their total.
///
/// The total is the sum of the rounded line totals so the displayed project
/// total always equals the sum of the displayed lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEstimate {
    pub urn: String,
    pub lines: Vec<CostLine>,
    pub total: f64,
    pub generated_at: DateTime<Utc>,
}

impl ProjectEstimate {
    /// Build an estimate from extracted records.
    #[must_use]
    pub fn from_records<'a, I>(urn: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a ElementRecord>,
    {
        let lines: Vec<CostLine> = records.into_iter().map(ElementRecord::to_line).collect();
        let total = round_cents(lines.iter().map(|l| l.total).sum());
        Self {
            urn: urn.into(),
            lines,
            total,
            generated_at: Utc::now(),
        }
    }

    /// Rebuild an estimate from lines produced earlier, re-deriving the total.
    #[must_use]
    pub fn from_lines(urn: impl Into<String>, lines: Vec<CostLine>) -> Self {
        let total = round_cents(lines.iter().map(|l| round_cents(l.total)).sum());
        Self {
            urn: urn.into(),
            lines,
            total,
            generated_at: Utc::now(),
        }
    }
}

/// Round a currency amount to cents.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Service Status
// =============================================================================

/// Credential presence per external service (not live connectivity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub xai: bool,
    pub openai: bool,
    pub forge: bool,
}
