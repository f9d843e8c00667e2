//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::models::ProjectEstimate;
use crate::core::prediction::CostPrediction;
use crate::error::Result;

/// Render an estimate.
pub fn render_estimate(
    estimate: &ProjectEstimate,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_estimate(estimate, no_color)),
        OutputFormat::Json => robot::render_envelope("estimate", estimate, pretty),
    }
}

/// Render a cost prediction.
pub fn render_prediction(
    prediction: &CostPrediction,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_prediction(prediction, no_color)),
        OutputFormat::Json => robot::render_envelope("predict", prediction, pretty),
    }
}

/// Render any serializable payload in robot mode.
pub fn render_robot<T: Serialize>(command: &str, data: T, pretty: bool) -> Result<String> {
    robot::render_envelope(command, data, pretty)
}
