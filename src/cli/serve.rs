//! Serve command implementation.

use crate::api::{AppState, serve};
use crate::cli::args::ServeArgs;
use crate::error::Result;
use crate::storage::AppConfig;

/// Execute the serve command.
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(bind) = &args.bind {
        config.set_bind(bind.clone());
    }
    let state = AppState::from_config(&config)?;

    if !state.forge.is_configured() {
        tracing::warn!("Forge credentials are not configured; upload and token endpoints will fail");
    }
    if state.gateway.table().select(crate::core::provider::Capability::TextCompletion).is_err() {
        tracing::warn!("No AI provider configured; AI endpoints will return 503");
    }

    tracing::info!(
        bind = %config.config.server.bind,
        source = %config.sources.bind,
        "Starting API server"
    );
    serve(state, &config.config.server.bind).await
}
