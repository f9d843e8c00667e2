//! bimcost - BIM cost estimation pipeline
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use bimcost::cli::{Cli, Commands};
use bimcost::core::logging;
use bimcost::storage::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        logging::LogLevel::Debug
    } else {
        cli.log_level
            .as_deref()
            .and_then(logging::LogLevel::from_arg)
            .or_else(logging::parse_log_level_from_env)
            .unwrap_or(if matches!(cli.command, Some(Commands::Serve(_))) {
                logging::LogLevel::Info
            } else {
                logging::LogLevel::default()
            })
    };
    let log_format = cli
        .log_format
        .as_deref()
        .and_then(logging::LogFormat::from_arg)
        .or_else(logging::parse_log_format_from_env)
        .unwrap_or_default();
    logging::init(log_level, log_format, logging::parse_log_file_from_env());

    let format = cli.effective_format();
    let pretty = cli.pretty;
    let no_color = !bimcost::util::env::should_use_color(cli.no_color);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(code = e.error_code(), error = %e, "Command failed");
            let output = bimcost::render::error::render_error(&e, format, no_color, pretty);
            eprintln!("{output}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> bimcost::Result<()> {
    let format = cli.effective_format();
    let pretty = cli.pretty;
    let no_color = !bimcost::util::env::should_use_color(cli.no_color);

    let Some(command) = cli.command else {
        print_quickstart();
        return Ok(());
    };
    let config = AppConfig::load_with(cli.config.as_deref())?;

    match command {
        Commands::Serve(args) => bimcost::cli::serve::execute(&args, config).await,
        Commands::Estimate(args) => {
            bimcost::cli::estimate::execute(&args, &config, format, pretty, no_color).await
        }
        Commands::Predict(args) => {
            bimcost::cli::predict::execute(&args, &config, format, pretty, no_color).await
        }
        Commands::Status => bimcost::cli::status::execute(&config, format, pretty, no_color),
        Commands::Token => bimcost::cli::status::execute_token(&config, format, pretty).await,
    }
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r"bimcost - BIM cost estimation

Upload a model, wait for translation, and price its elements.

USAGE:
    bimcost [OPTIONS] <COMMAND>

COMMANDS:
    serve      Run the HTTP API
    estimate   Upload a model and print its cost estimate
    predict    Predict project cost from a brief
    status     Show which services have credentials configured
    token      Print a read-only viewer access token

QUICK START:
    bimcost status                          # Check configured credentials
    bimcost estimate model.ifc              # Upload, translate, price
    bimcost estimate --urn <URN> --json     # Resume a submitted job
    bimcost predict --type residential --area 150 --location Melbourne
    bimcost serve --bind 0.0.0.0:5000       # Start the API

Run 'bimcost <COMMAND> --help' for more information."
    );
}
