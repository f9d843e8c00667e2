//! Human-readable output.
//!
//! Plain aligned text with optional ANSI styling through `colored`.

use std::fmt::Write as _;

use colored::Colorize;

use crate::core::models::{ProjectEstimate, ServiceStatus};
use crate::core::prediction::CostPrediction;
use crate::storage::ConfigSources;
use crate::util::format::{format_cost, format_percent};

const ELEMENT_WIDTH: usize = 36;
const CATEGORY_WIDTH: usize = 22;
const QUANTITY_WIDTH: usize = 14;
const MONEY_WIDTH: usize = 14;

fn heading(text: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        text.bold().to_string()
    }
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Render an estimate as a table with a total row.
#[must_use]
pub fn render_estimate(estimate: &ProjectEstimate, no_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        heading(&format!("Estimate for {}", estimate.urn), no_color)
    );

    if estimate.lines.is_empty() {
        out.push_str("No elements found in the model.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<ELEMENT_WIDTH$} {:<CATEGORY_WIDTH$} {:>QUANTITY_WIDTH$} {:>MONEY_WIDTH$} {:>MONEY_WIDTH$}",
        "Element", "Category", "Quantity", "Unit cost", "Total"
    );
    let _ = writeln!(
        out,
        "{}",
        "-".repeat(ELEMENT_WIDTH + CATEGORY_WIDTH + QUANTITY_WIDTH + 2 * MONEY_WIDTH + 4)
    );
    for line in &estimate.lines {
        let _ = writeln!(
            out,
            "{:<ELEMENT_WIDTH$} {:<CATEGORY_WIDTH$} {:>QUANTITY_WIDTH$} {:>MONEY_WIDTH$} {:>MONEY_WIDTH$}",
            clip(&line.element, ELEMENT_WIDTH),
            clip(&line.category, CATEGORY_WIDTH),
            line.quantity,
            format_cost(line.unit_cost),
            format_cost(line.total),
        );
    }

    let total = format_cost(estimate.total);
    let total = if no_color {
        total
    } else {
        total.green().bold().to_string()
    };
    let _ = writeln!(
        out,
        "\n{} elements, project total {total}",
        estimate.lines.len()
    );
    out
}

/// Render a cost prediction.
#[must_use]
pub fn render_prediction(prediction: &CostPrediction, no_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading("Cost prediction", no_color));
    let _ = writeln!(
        out,
        "  Predicted: {}",
        format_cost(prediction.predicted_cost)
    );
    let _ = writeln!(
        out,
        "  Range:     {} - {}",
        format_cost(prediction.min_cost),
        format_cost(prediction.max_cost)
    );
    let _ = writeln!(
        out,
        "  Confidence: {}",
        format_percent(prediction.confidence * 100.0)
    );

    if !prediction.breakdown.is_empty() {
        let _ = writeln!(out, "\n{}", heading("Breakdown", no_color));
        for (item, amount) in &prediction.breakdown {
            let _ = writeln!(out, "  {item:<28} {:>14}", format_cost(*amount));
        }
    }
    for (title, items) in [("Factors", &prediction.factors), ("Risks", &prediction.risks)] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", heading(title, no_color));
        for item in items {
            let _ = writeln!(out, "  - {item}");
        }
    }
    out
}

/// Render credential presence per service.
#[must_use]
pub fn render_status(status: &ServiceStatus, sources: &ConfigSources, no_color: bool) -> String {
    let mark = |ok: bool| match (ok, no_color) {
        (true, true) => "configured".to_string(),
        (false, true) => "missing".to_string(),
        (true, false) => "configured".green().to_string(),
        (false, false) => "missing".red().to_string(),
    };
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading("Services", no_color));
    let _ = writeln!(out, "  forge   {} ({})", mark(status.forge), sources.forge);
    let _ = writeln!(out, "  xai     {} ({})", mark(status.xai), sources.xai);
    let _ = writeln!(out, "  openai  {} ({})", mark(status.openai), sources.openai);
    out
}
