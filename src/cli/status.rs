//! Status and token commands.

use chrono::Utc;
use serde_json::json;

use crate::cli::args::OutputFormat;
use crate::core::models::ServiceStatus;
use crate::core::provider::AiProvider;
use crate::error::Result;
use crate::forge::ForgeClient;
use crate::render::{self, human};
use crate::storage::AppConfig;

/// Credential presence per service. No remote call.
#[must_use]
pub fn service_status(config: &AppConfig) -> ServiceStatus {
    let table = config.provider_table();
    ServiceStatus {
        xai: table.is_available(AiProvider::Xai),
        openai: table.is_available(AiProvider::OpenAi),
        forge: config.forge_credentials().is_some(),
    }
}

/// Execute the status command.
pub fn execute(
    config: &AppConfig,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<()> {
    let status = service_status(config);
    match format {
        OutputFormat::Human => print!("{}", human::render_status(&status, &config.sources, no_color)),
        OutputFormat::Json => println!("{}", render::render_robot("status", status, pretty)?),
    }
    Ok(())
}

/// Execute the token command: print a viewer-scope token.
pub async fn execute_token(config: &AppConfig, format: OutputFormat, pretty: bool) -> Result<()> {
    let forge = ForgeClient::from_config(config)?;
    let token = forge.viewer_tokens().access_token().await?;
    let expires_in = token.expires_in(Utc::now());

    match format {
        OutputFormat::Human => println!("{}", token.token),
        OutputFormat::Json => println!(
            "{}",
            render::render_robot(
                "token",
                json!({ "access_token": token.token, "expires_in": expires_in }),
                pretty
            )?
        ),
    }
    Ok(())
}
