//! Predict command implementation.

use crate::cli::args::{OutputFormat, PredictArgs};
use crate::core::gateway::AiGateway;
use crate::core::prediction::predict_cost;
use crate::error::Result;
use crate::render;
use crate::storage::AppConfig;

/// Execute the predict command.
pub async fn execute(
    args: &PredictArgs,
    config: &AppConfig,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<()> {
    let brief = args.brief();
    brief.validate()?;

    let gateway = AiGateway::new(config.provider_table(), config.ai_timeout())?;
    tracing::debug!(project_type = %brief.project_type, area = brief.area, "Requesting prediction");
    let prediction = predict_cost(&gateway, &brief).await?;

    let output = render::render_prediction(&prediction, format, pretty, no_color)?;
    print!("{output}");
    Ok(())
}
