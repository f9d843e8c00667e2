//! Narrative cost report generated from an estimate.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::gateway::AiGateway;
use super::models::ProjectEstimate;
use super::provider::Capability;
use crate::error::Result;
use crate::providers::Prompt;

/// Lines included verbatim in the prompt; the rest are summarized by category.
const MAX_PROMPT_LINES: usize = 40;

const SYSTEM_PROMPT: &str = "You are a construction cost consultant writing for a client. \
Respond with a single JSON object and nothing else.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
}

/// Structured report returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostReport {
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<ReportSection>,
    pub recommendations: Vec<String>,
}

/// Generate a report for `estimate` with the preferred text provider.
///
/// # Errors
///
/// Returns the gateway's errors; a malformed reply yields an empty report.
pub async fn generate_report(
    gateway: &AiGateway,
    project_name: &str,
    estimate: &ProjectEstimate,
) -> Result<CostReport> {
    let prompt = Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: report_prompt(project_name, estimate),
        image: None,
        json: true,
        max_tokens: Some(2000),
    };
    gateway
        .complete_json(Capability::TextCompletion, &prompt)
        .await
}

fn report_prompt(project_name: &str, estimate: &ProjectEstimate) -> String {
    let mut out = format!(
        "Write a cost report for project \"{project_name}\".\n\
         Total estimated cost: {:.2}\n\
         Line items ({}):\n",
        estimate.total,
        estimate.lines.len()
    );
    for line in estimate.lines.iter().take(MAX_PROMPT_LINES) {
        let _ = writeln!(
            out,
            "- {} [{}]: {} at {:.2} = {:.2}",
            line.element, line.category, line.quantity, line.unit_cost, line.total
        );
    }
    if estimate.lines.len() > MAX_PROMPT_LINES {
        let rest: f64 = estimate.lines[MAX_PROMPT_LINES..].iter().map(|l| l.total).sum();
        let _ = writeln!(
            out,
            "- {} further items totalling {rest:.2}",
            estimate.lines.len() - MAX_PROMPT_LINES
        );
    }
    out.push_str(
        "\nReturn JSON with keys: title, executiveSummary, sections (array of \
         {heading, body}), recommendations (array of strings).",
    );
    out
}
