//! Error rendering for the CLI.
//!
//! Styled text with a fix hint for terminals, structured JSON for robot mode.

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::BimcostError;

/// Structured error for robot output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorJson {
    pub code: &'static str,
    pub category: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl ErrorJson {
    #[must_use]
    pub fn from_error(error: &BimcostError) -> Self {
        Self {
            code: error.error_code(),
            category: error.category().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            hint: fix_hint(error),
        }
    }
}

/// One-line remedy for errors the user can fix locally.
#[must_use]
pub fn fix_hint(error: &BimcostError) -> Option<&'static str> {
    match error {
        BimcostError::Credential(_) => {
            Some("Set FORGE_CLIENT_ID and FORGE_CLIENT_SECRET, or add them under [forge] in the config file.")
        }
        BimcostError::NoProviderAvailable { .. } => {
            Some("Set XAI_API_KEY or OPENAI_API_KEY, or add a key under [ai] in the config file.")
        }
        BimcostError::UploadRejected { too_large: true, .. } => {
            Some("Split the model before uploading; [server] max_upload_mib allows up to 500.")
        }
        BimcostError::UploadRejected { .. } => Some("Supported model formats are .rvt, .ifc, .dwg and .dxf."),
        BimcostError::Submission { .. } => {
            Some("The model could not be translated as uploaded; check the file opens in its authoring tool.")
        }
        BimcostError::NotReady { .. } => {
            Some("Wait for the translation to reach success, then retry; `bimcost estimate --urn <URN>` resumes tracking.")
        }
        BimcostError::ProviderTimeout { .. } | BimcostError::Timeout(_) => {
            Some("The remote service was slow; retry, or raise the timeout in the config file.")
        }
        BimcostError::Config(_) | BimcostError::ConfigInvalid { .. } => {
            Some("Check the config file (BIMCOST_CONFIG or --config) against the documented keys.")
        }
        _ => None,
    }
}

/// Render an error according to the output format.
#[must_use]
pub fn render_error(error: &BimcostError, format: OutputFormat, no_color: bool, pretty: bool) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        OutputFormat::Human => render_human(error, no_color),
    }
}

/// Render error as structured JSON for machine consumption.
#[must_use]
pub fn render_error_json(error: &BimcostError, pretty: bool) -> String {
    let body = serde_json::json!({ "error": ErrorJson::from_error(error) });
    let rendered = if pretty {
        serde_json::to_string_pretty(&body)
    } else {
        serde_json::to_string(&body)
    };
    rendered.unwrap_or_else(|_| render_human(error, true))
}

fn render_human(error: &BimcostError, no_color: bool) -> String {
    let code = format!("[{}]", error.error_code());
    let mut out = if no_color {
        format!("Error {code}: {error}")
    } else {
        format!("{} {}: {error}", "Error".red().bold(), code.dimmed())
    };
    if let Some(hint) = fix_hint(error) {
        out.push_str("\n  ");
        out.push_str(hint);
    }
    if error.is_retryable() {
        out.push_str("\n  This error is transient; retrying may succeed.");
    }
    out
}
