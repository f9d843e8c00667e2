//! Error types for bimcost.
//!
//! Uses `thiserror` for structured error types that map to exit codes and
//! HTTP responses.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized so callers can decide whether to retry:
//! - **Authentication**: Forge credentials absent or rejected (never retried)
//! - **Upload**: transfer failures (retry from scratch) and policy rejections
//! - **Translation**: job submission and sequencing errors
//! - **Provider**: AI backend selection, timeouts, and API failures
//! - **Network**: connection and timeout issues talking to remote services
//! - **Configuration**: config file parsing or invalid values
//! - **Input**: malformed requests from the caller
//! - **Internal**: I/O, JSON, and unclassified errors
//!
//! Each error has a stable error code (e.g., `BIMC-A001`) for programmatic handling.

pub mod http;

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Forge credential problems.
    Authentication,
    /// Upload channel failures and rejections.
    Upload,
    /// Translation job submission and sequencing.
    Translation,
    /// AI provider selection and invocation.
    Provider,
    /// Connection and timeout issues.
    Network,
    /// Configuration issues.
    Configuration,
    /// Malformed caller input.
    Input,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Upload => "Upload error",
            Self::Translation => "Translation error",
            Self::Provider => "Provider error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Input => "Input error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Upload => "U",
            Self::Translation => "T",
            Self::Provider => "P",
            Self::Network => "N",
            Self::Configuration => "C",
            Self::Input => "I",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Missing or rejected credentials, no provider configured
    NotConfigured = 2,
    /// Input rejected (file policy, malformed URN, bad config)
    InvalidInput = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for bimcost operations.
#[derive(Error, Debug)]
pub enum BimcostError {
    // ==========================================================================
    // Authentication errors
    // ==========================================================================
    /// Forge credentials are absent or were rejected by the identity service.
    #[error("credential error: {0}")]
    Credential(String),

    // ==========================================================================
    // Upload errors
    // ==========================================================================
    /// Transfer failed mid-stream; the caller must restart from byte zero.
    #[error("upload of {file_name} failed at byte {offset}: {reason}")]
    Upload {
        file_name: String,
        offset: u64,
        reason: String,
    },

    /// File rejected by the validating path before any remote call.
    #[error("upload rejected: {reason}")]
    UploadRejected { reason: String, too_large: bool },

    // ==========================================================================
    // Translation errors
    // ==========================================================================
    /// Translation job could not be registered for this URN.
    #[error("translation submission failed for {urn}: {reason}")]
    Submission { urn: String, reason: String },

    /// Extraction requested before the translation job reached success.
    #[error("translation for {urn} is not ready (status: {status})")]
    NotReady { urn: String, status: String },

    // ==========================================================================
    // Provider errors
    // ==========================================================================
    /// No configured AI provider supports the requested capability.
    #[error("no AI provider available for {capability}")]
    NoProviderAvailable { capability: String },

    /// An AI provider call exceeded its time budget.
    #[error("{provider} did not respond within {seconds}s")]
    ProviderTimeout { provider: String, seconds: u64 },

    /// An AI provider returned a non-success status.
    #[error("provider {provider} API error: {message}")]
    ProviderApi {
        provider: String,
        status_code: Option<u16>,
        message: String,
    },

    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Forge API returned a non-success status.
    #[error("forge API error (HTTP {status_code}) during {operation}: {message}")]
    ForgeApi {
        operation: String,
        status_code: u16,
        message: String,
    },

    /// Request timeout.
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    /// Generic network error.
    #[error("network error: {0}")]
    Network(String),

    /// Remote response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    // ==========================================================================
    // Input errors
    // ==========================================================================
    /// Request body or argument is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BimcostError {
    /// Map error to a CLI exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Credential(_) | Self::NoProviderAvailable { .. } => ExitCode::NotConfigured,

            Self::UploadRejected { .. }
            | Self::Submission { .. }
            | Self::NotReady { .. }
            | Self::Config(_)
            | Self::ConfigInvalid { .. }
            | Self::InvalidInput(_) => ExitCode::InvalidInput,

            Self::Timeout(_) | Self::ProviderTimeout { .. } => ExitCode::Timeout,

            Self::Upload { .. }
            | Self::ProviderApi { .. }
            | Self::ForgeApi { .. }
            | Self::Network(_)
            | Self::ParseResponse(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Credential(_) => ErrorCategory::Authentication,
            Self::Upload { .. } | Self::UploadRejected { .. } => ErrorCategory::Upload,
            Self::Submission { .. } | Self::NotReady { .. } => ErrorCategory::Translation,
            Self::NoProviderAvailable { .. }
            | Self::ProviderTimeout { .. }
            | Self::ProviderApi { .. } => ErrorCategory::Provider,
            Self::ForgeApi { .. }
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::ParseResponse(_) => ErrorCategory::Network,
            Self::Config(_) | Self::ConfigInvalid { .. } => ErrorCategory::Configuration,
            Self::InvalidInput(_) => ErrorCategory::Input,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `BIMC-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Credential(_) => "BIMC-A001",

            Self::Upload { .. } => "BIMC-U001",
            Self::UploadRejected { .. } => "BIMC-U002",

            Self::Submission { .. } => "BIMC-T001",
            Self::NotReady { .. } => "BIMC-T002",

            Self::NoProviderAvailable { .. } => "BIMC-P001",
            Self::ProviderTimeout { .. } => "BIMC-P002",
            Self::ProviderApi { .. } => "BIMC-P003",

            Self::ForgeApi { .. } => "BIMC-N001",
            Self::Timeout(_) => "BIMC-N002",
            Self::ParseResponse(_) => "BIMC-N003",
            Self::Network(_) => "BIMC-N099",

            Self::Config(_) => "BIMC-C001",
            Self::ConfigInvalid { .. } => "BIMC-C002",

            Self::InvalidInput(_) => "BIMC-I001",

            Self::Io(_) => "BIMC-X001",
            Self::Json(_) => "BIMC-X002",
            Self::Other(_) => "BIMC-X099",
        }
    }

    /// Returns whether the caller may retry the failed operation.
    ///
    /// Credential, submission, sequencing, and provider-availability errors
    /// will not change without a configuration or input change.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Upload { .. }
            | Self::ProviderTimeout { .. }
            | Self::Timeout(_)
            | Self::Network(_) => true,
            // 202: derivative data is still being prepared.
            Self::ForgeApi { status_code, .. } => {
                *status_code == 202 || *status_code == 429 || *status_code >= 500
            }
            Self::ProviderApi { status_code, .. } => match status_code {
                Some(code) => *code == 429 || *code >= 500,
                None => false,
            },
            _ => false,
        }
    }

    /// Returns the provider name if this error is provider-specific.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::ProviderTimeout { provider, .. } | Self::ProviderApi { provider, .. } => {
                Some(provider)
            }
            _ => None,
        }
    }
}

/// Result type alias for bimcost operations.
pub type Result<T> = std::result::Result<T, BimcostError>;

// =============================================================================
// Tests
// =============================================================================
