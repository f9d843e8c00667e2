//! Robot-mode output (JSON).
//!
//! Every command wraps its payload in the same envelope so scripts can
//! dispatch on `command` and check `schemaVersion`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Schema identifier for the envelope.
pub const SCHEMA_VERSION: &str = "bimcost.v1";

/// JSON envelope around a command's result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            command: command.into(),
            data,
        }
    }
}

/// Render any value as JSON.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(output)?)
    } else {
        Ok(serde_json::to_string(output)?)
    }
}

/// Render a command result inside the envelope.
pub fn render_envelope<T: Serialize>(command: &str, data: T, pretty: bool) -> Result<String> {
    render_json(&RobotOutput::new(command, data), pretty)
}
