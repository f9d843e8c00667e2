//! AI cost prediction.
//!
//! Model output is read leniently: numbers may arrive as strings with
//! currency symbols, and any missing field falls back to an empty value.
//! When the model omits `minCost`/`maxCost` they are derived from the
//! predicted cost at fixed offsets of -15% and +20%.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::gateway::AiGateway;
use super::models::round_cents;
use super::provider::Capability;
use crate::error::{BimcostError, Result};
use crate::providers::Prompt;

/// Lower bound factor applied when the provider gives no `minCost`.
pub const MIN_COST_FACTOR: f64 = 0.85;
/// Upper bound factor applied when the provider gives no `maxCost`.
pub const MAX_COST_FACTOR: f64 = 1.20;

const SYSTEM_PROMPT: &str = "You are a senior construction cost estimator. \
Respond with a single JSON object and nothing else.";

/// Project description submitted for prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBrief {
    #[serde(rename = "type")]
    pub project_type: String,
    /// Gross floor area in square metres.
    pub area: f64,
    pub location: String,
    pub complexity: String,
    pub timeline: String,
}

impl ProjectBrief {
    /// Reject briefs the model cannot price.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty type or a non-positive area.
    pub fn validate(&self) -> Result<()> {
        if self.project_type.trim().is_empty() {
            return Err(BimcostError::InvalidInput("type is required".to_string()));
        }
        if !self.area.is_finite() || self.area <= 0.0 {
            return Err(BimcostError::InvalidInput(format!(
                "area must be a positive number of square metres, got {}",
                self.area
            )));
        }
        Ok(())
    }

    fn prompt(&self) -> Prompt {
        let user = format!(
            "Estimate the construction cost for this project.\n\
             Project type: {}\n\
             Gross floor area: {} m²\n\
             Location: {}\n\
             Complexity: {}\n\
             Timeline: {}\n\n\
             Return JSON with keys: predictedCost (number, AUD), minCost, maxCost, \
             confidence (0-1), breakdown (object of cost category to amount), \
             factors (array of strings), risks (array of strings).",
            self.project_type, self.area, self.location, self.complexity, self.timeline
        );
        Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
            image: None,
            json: true,
            max_tokens: Some(1200),
        }
    }
}

/// Structured prediction returned to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPrediction {
    pub predicted_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub factors: Vec<String>,
    pub risks: Vec<String>,
}

impl CostPrediction {
    /// Build from a model reply, deriving bounds where absent.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let predicted_cost = value.get("predictedCost").and_then(number).unwrap_or(0.0);
        let (min_cost, max_cost) = derive_bounds(
            predicted_cost,
            value.get("minCost").and_then(number),
            value.get("maxCost").and_then(number),
        );

        let confidence = value
            .get("confidence")
            .and_then(number)
            .map_or(0.0, |c| if c > 1.0 { c / 100.0 } else { c })
            .clamp(0.0, 1.0);

        let breakdown = value
            .get("breakdown")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| number(v).map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            predicted_cost,
            min_cost,
            max_cost,
            confidence,
            breakdown,
            factors: strings(value.get("factors")),
            risks: strings(value.get("risks")),
        }
    }
}

/// Fill in missing bounds as `predicted * 0.85` and `predicted * 1.20`,
/// rounded to cents. Provider-supplied bounds are kept as given.
#[must_use]
pub fn derive_bounds(predicted: f64, min: Option<f64>, max: Option<f64>) -> (f64, f64) {
    (
        min.unwrap_or_else(|| round_cents(predicted * MIN_COST_FACTOR)),
        max.unwrap_or_else(|| round_cents(predicted * MAX_COST_FACTOR)),
    )
}

/// Ask the preferred text provider for a cost prediction.
///
/// # Errors
///
/// Returns `InvalidInput` for a bad brief, otherwise the gateway's errors.
/// A malformed model reply is not an error; it yields a zeroed prediction.
pub async fn predict_cost(gateway: &AiGateway, brief: &ProjectBrief) -> Result<CostPrediction> {
    brief.validate()?;
    let value: Value = gateway
        .complete_json(Capability::TextCompletion, &brief.prompt())
        .await?;
    let prediction = CostPrediction::from_value(&value);
    tracing::info!(
        project_type = %brief.project_type,
        predicted = prediction.predicted_cost,
        "Cost prediction complete"
    );
    Ok(prediction)
}

/// Read a number that may be encoded as a string like "$1,250,000".
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}
