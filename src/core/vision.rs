//! Drawing and site-photo analysis through a vision-capable provider.

use serde::{Deserialize, Serialize};

use super::gateway::AiGateway;
use super::provider::Capability;
use crate::error::{BimcostError, Result};
use crate::providers::{ImageInput, Prompt};

/// Largest image accepted for analysis.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

const SYSTEM_PROMPT: &str = "You are a quantity surveyor reading architectural drawings \
and construction photos. Respond with a single JSON object and nothing else.";

const USER_PROMPT: &str = "Identify the construction elements visible in this image and \
estimate their quantities. Return JSON with keys: summary (string), elements (array of \
{name, quantity, unit}), estimatedArea (number of square metres, or null), notes (array \
of strings).";

/// One element the model identified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectedElement {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// Structured image analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub summary: String,
    pub elements: Vec<DetectedElement>,
    pub estimated_area: Option<f64>,
    pub notes: Vec<String>,
}

/// Analyze an image with the preferred vision provider.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty, oversized, or non-image payload,
/// otherwise the gateway's errors.
pub async fn analyze_image(
    gateway: &AiGateway,
    bytes: Vec<u8>,
    mime_type: &str,
) -> Result<ImageAnalysis> {
    if bytes.is_empty() {
        return Err(BimcostError::InvalidInput("image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(BimcostError::InvalidInput(format!(
            "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
            bytes.len()
        )));
    }
    if !mime_type.starts_with("image/") {
        return Err(BimcostError::InvalidInput(format!(
            "expected an image content type, got {mime_type}"
        )));
    }

    let prompt = Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: USER_PROMPT.to_string(),
        image: Some(ImageInput {
            mime_type: mime_type.to_string(),
            bytes,
        }),
        json: true,
        max_tokens: Some(1500),
    };

    let analysis: ImageAnalysis = gateway
        .complete_json(Capability::VisionAnalysis, &prompt)
        .await?;
    tracing::info!(elements = analysis.elements.len(), "Image analysis complete");
    Ok(analysis)
}
